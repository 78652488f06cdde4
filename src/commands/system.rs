use colored::Colorize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemAction {
    Continue,
    Exit,
}

pub fn print_help() {
    println!("\n{}", "🎓 Program Advisor Commands:".bold());
    println!("  Just type your question about the two programs");
    println!("  Examples:");
    println!("    - which program has more machine learning courses?");
    println!("    - how long is the thesis in each program?");
    println!();

    println!("🔎 Knowledge Commands:");
    println!("  search <question>        - Show curriculum passages matching a question");
    println!("  image <file> <question>  - Ask about an image (local backend only)");
    println!();

    println!("👤 Persona Commands:");
    println!("  prompt          - Show the current system prompt");
    println!("  persona <file>  - Load a persona from a JSON file");
    println!();

    println!("⚙️ System Commands:");
    println!("  model  - Show the serving model");
    println!("  help   - Show this help menu");
    println!("  exit   - Exit the program");
    println!();
}

pub fn handle_command(input: &str) -> Result<SystemAction, String> {
    match input.to_lowercase().as_str() {
        "help" => {
            print_help();
            Ok(SystemAction::Continue)
        }
        "exit" | "quit" => {
            println!("👋 Goodbye!");
            Ok(SystemAction::Exit)
        }
        _ => Err("Unknown system command. Type 'help' for available commands.".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_and_help() {
        assert_eq!(handle_command("QUIT"), Ok(SystemAction::Exit));
        assert_eq!(handle_command("help"), Ok(SystemAction::Continue));
        assert!(handle_command("reboot").is_err());
    }
}

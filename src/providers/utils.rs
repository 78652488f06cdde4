use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;

/// Reads an image file and returns it as a base64 JPEG data URI.
pub fn encode_image_to_data_uri(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .map_err(|e| anyhow!("Failed to encode image '{}': {}", path.display(), e))?;
    Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(bytes)))
}

/// Removes `<think>...</think>` blocks some reasoning models emit inline.
pub fn strip_reasoning(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("<think>") {
        out.push_str(&rest[..start]);
        match rest[start..].find("</think>") {
            Some(end) => rest = &rest[start + end + "</think>".len()..],
            // Unterminated block: everything after it is reasoning
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn strips_think_blocks() {
        assert_eq!(strip_reasoning("<think>compare credits</think>\n\nProgram A."), "Program A.");
        assert_eq!(strip_reasoning("No reasoning here."), "No reasoning here.");
        assert_eq!(strip_reasoning("A <think>x</think>and <think>y</think>B"), "A and B");
        assert_eq!(strip_reasoning("Answer.<think>never closed"), "Answer.");
    }

    #[test]
    fn encodes_images_as_data_uris() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"abc").unwrap();
        let uri = encode_image_to_data_uri(file.path()).unwrap();
        assert_eq!(uri, "data:image/jpeg;base64,YWJj");
    }

    #[test]
    fn missing_image_names_the_file() {
        let err = encode_image_to_data_uri(Path::new("/nonexistent/brochure.jpg")).unwrap_err();
        assert!(err.to_string().contains("brochure.jpg"));
    }
}

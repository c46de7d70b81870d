use crate::utils::error::Result;
use std::io::{BufRead, Write};

/// Asks a yes/no question on stdout and reads the answer from `input`.
/// Only `y` and `yes` (any case) confirm.
pub fn confirm_with<R: BufRead, W: Write>(
    question: &str,
    input: &mut R,
    output: &mut W,
) -> Result<bool> {
    write!(output, "{} (y/N): ", question)?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

pub fn confirm(question: &str) -> Result<bool> {
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut output = std::io::stdout();
    confirm_with(question, &mut input, &mut output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn answer(text: &str) -> bool {
        let mut input = Cursor::new(text.as_bytes().to_vec());
        let mut output = Vec::new();
        confirm_with("確認開始更新嗎？", &mut input, &mut output).unwrap()
    }

    #[test]
    fn test_confirm_answers() {
        assert!(answer("y\n"));
        assert!(answer("YES\n"));
        assert!(!answer("\n"));
        assert!(!answer("n\n"));
        assert!(!answer(""));
    }
}

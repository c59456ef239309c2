//! Assembler error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssemblerError {
    #[error("Syntax error at line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("Unknown instruction at line {line}: {mnemonic}")]
    UnknownInstruction { line: usize, mnemonic: String },

    #[error("Unknown directive at line {line}: {directive}")]
    UnknownDirective { line: usize, directive: String },

    #[error("Wrong number of arguments for '{mnemonic}' at line {line}")]
    WrongArgCount { line: usize, mnemonic: String },

    #[error("Unknown label or value at line {line}: '{value}'")]
    UnknownValue { line: usize, value: String },

    #[error("Label '{label}' defined twice near line {line}")]
    DuplicateLabel { line: usize, label: String },

    #[error("Bad escape sequence at line {line}: {text}")]
    BadEscape { line: usize, text: String },

    #[error("No scratch registers left at line {line}")]
    NoScratchRegisters { line: usize },

    #[error("{message} (line {line})")]
    Unsupported { line: usize, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Spec error: {0}")]
    Spec(#[from] corevm_spec::SpecError),
}

pub type Result<T> = std::result::Result<T, AssemblerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_strings() {
        let err = AssemblerError::UnknownInstruction {
            line: 3,
            mnemonic: "FROB".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown instruction at line 3: FROB");

        let err = AssemblerError::DuplicateLabel {
            line: 9,
            label: "loop".to_string(),
        };
        assert_eq!(err.to_string(), "Label 'loop' defined twice near line 9");
    }
}

// =============================================================================
// ARGUMENTS - `--key value` pairs from the command line
// =============================================================================
//
// Keys are free-form: anything after `--` is accepted and stored, and the
// caller looks up the ones it understands.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgsError {
    #[error("missing or extra argument")]
    OddCount,
    #[error("expected option, got {0:?}")]
    ExpectedOption(String),
    #[error("unknown option {0:?}")]
    UnknownOption(String),
}

/// Parsed command-line options. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arguments {
    values: HashMap<String, String>,
}

impl Arguments {
    /// Parse arguments, excluding the program name.
    /// Later duplicates overwrite earlier ones.
    pub fn parse<I, S>(args: I) -> Result<Self, ArgsError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        if args.len() % 2 != 0 {
            return Err(ArgsError::OddCount);
        }

        let mut values = HashMap::new();
        for pair in args.chunks(2) {
            let (option, value) = (&pair[0], &pair[1]);
            if option.len() < 3 {
                return Err(ArgsError::ExpectedOption(option.clone()));
            }
            let key = option
                .strip_prefix("--")
                .ok_or_else(|| ArgsError::UnknownOption(option.clone()))?;
            values.insert(key.to_string(), value.clone());
        }

        Ok(Self { values })
    }

    pub fn from_env() -> Result<Self, ArgsError> {
        Self::parse(std::env::args().skip(1))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// `on`/`true` and `off`/`false`; anything else is `None`
    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.get(key)?.to_ascii_lowercase().as_str() {
            "on" | "true" => Some(true),
            "off" | "false" => Some(false),
            other => {
                log::warn!("Ignoring --{} {:?}: expected on/off", key, other);
                None
            }
        }
    }
}

//! Six digit code generation.

use rand::Rng;
use std::str::FromStr;

pub const CODE_LENGTH: usize = 6;

/// Range codes are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodeSpace {
    /// 100000-999999, never a leading zero.
    #[default]
    Legacy,
    /// 000000-999999, zero-padded.
    Full,
}

impl CodeSpace {
    fn bounds(self) -> (u32, u32) {
        match self {
            Self::Legacy => (100_000, 999_999),
            Self::Full => (0, 999_999),
        }
    }
}

impl FromStr for CodeSpace {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "full" => Ok(Self::Full),
            other => Err(format!("unknown code space: {other}")),
        }
    }
}

/// Draw a uniformly random code from `space`.
#[must_use]
pub fn generate_code(space: CodeSpace) -> String {
    let (low, high) = space.bounds();
    let code: u32 = rand::thread_rng().gen_range(low..=high);
    format!("{code:0width$}", width = CODE_LENGTH)
}

/// Cheap shape check so obviously malformed submissions skip the store.
#[must_use]
pub fn well_formed(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|byte| byte.is_ascii_digit())
}

use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};
use std::ops::Deref;

#[cfg(feature = "backtrace")]
use std::backtrace::Backtrace;

pub type SproutResult<T> = Result<T, SproutError>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidConfig,
    InvalidParameter,
    Network,
    Genome,
    Selection,
    Evaluation,
    Context,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrString(Cow<'static, str>);

impl AsRef<str> for ErrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ErrString {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<T: Into<Cow<'static, str>>> From<T> for ErrString {
    fn from(v: T) -> Self {
        Self(v.into())
    }
}

#[derive(Debug)]
pub enum SproutError {
    InvalidConfig {
        message: ErrString,
    },
    InvalidParameter {
        message: ErrString,
    },
    Network {
        message: ErrString,
    },
    Genome {
        message: ErrString,
    },
    Selection {
        message: ErrString,
    },
    Evaluation {
        message: ErrString,
    },

    Context {
        context: ErrorContext,
        source: Box<SproutError>,
        #[cfg(feature = "backtrace")]
        backtrace: Backtrace,
    },
}

impl SproutError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidConfig { .. } => ErrorCode::InvalidConfig,
            Self::InvalidParameter { .. } => ErrorCode::InvalidParameter,
            Self::Network { .. } => ErrorCode::Network,
            Self::Genome { .. } => ErrorCode::Genome,
            Self::Selection { .. } => ErrorCode::Selection,
            Self::Evaluation { .. } => ErrorCode::Evaluation,
            Self::Context { .. } => ErrorCode::Context,
        }
    }

    pub fn with_context(self, msg: impl Into<String>) -> Self {
        SproutError::Context {
            context: ErrorContext::new(msg),
            source: Box::new(self),
            #[cfg(feature = "backtrace")]
            backtrace: Backtrace::capture(),
        }
    }
}

impl Display for SproutError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { message } => write!(f, "Invalid configuration: {}", message),
            Self::InvalidParameter { message } => write!(f, "Invalid parameter: {}", message),
            Self::Network { message } => write!(f, "Network error: {}", message),
            Self::Genome { message } => write!(f, "Genome error: {}", message),
            Self::Selection { message } => write!(f, "Selection error: {}", message),
            Self::Evaluation { message } => write!(f, "Evaluation error: {}", message),
            Self::Context {
                context, source, ..
            } => write!(f, "{}\nCaused by: {}", context, source),
        }
    }
}

impl std::error::Error for SproutError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Context { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct ErrorContext {
    message: String,
}

impl ErrorContext {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl Display for ErrorContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ErrorContext {}

pub trait ResultExt<T> {
    fn context(self, msg: impl Into<String>) -> SproutResult<T>;
    fn with_context<F: FnOnce() -> String>(self, f: F) -> SproutResult<T>;
}

impl<T, E: Into<SproutError>> ResultExt<T> for Result<T, E> {
    fn context(self, msg: impl Into<String>) -> SproutResult<T> {
        self.map_err(|e| e.into().with_context(msg))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> SproutResult<T> {
        self.map_err(|e| e.into().with_context(f()))
    }
}

#[doc(hidden)]
pub mod __private {
    #[inline]
    #[cold]
    #[must_use]
    pub fn must_use<E>(e: E) -> E {
        e
    }
}

#[macro_export]
macro_rules! sprout_err {
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::SproutError::$variant { message: format!($fmt, $($arg),*).into() })
    };
    ($variant:ident: $msg:expr $(,)?) => {
        $crate::__private::must_use($crate::SproutError::$variant { message: $msg.into() })
    };
}

#[macro_export]
macro_rules! sprout_bail {
    ($($tt:tt)+) => { return Err($crate::sprout_err!($($tt)+)) };
}

#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($tt:tt)+) => {
        if !$cond { $crate::sprout_bail!($($tt)+); }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_match_variants() {
        let err = sprout_err!(InvalidConfig: "population of {} is too small", 1);
        assert_eq!(err.code(), ErrorCode::InvalidConfig);
        assert_eq!(
            err.to_string(),
            "Invalid configuration: population of 1 is too small"
        );
    }

    #[test]
    fn context_wraps_source() {
        fn inner() -> SproutResult<()> {
            sprout_bail!(Network: "edge endpoints missing")
        }

        let err = inner().context("while splitting an edge").unwrap_err();
        assert_eq!(err.code(), ErrorCode::Context);
        assert!(err.to_string().contains("while splitting an edge"));
        assert!(err.to_string().contains("edge endpoints missing"));
    }

    #[test]
    fn ensure_returns_ok_when_condition_holds() {
        fn check(n: usize) -> SproutResult<()> {
            ensure!(n > 1, InvalidParameter: "need at least two genomes, got {}", n);
            Ok(())
        }

        assert!(check(2).is_ok());
        assert!(check(0).is_err());
    }
}

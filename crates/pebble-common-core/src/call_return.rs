//! `CallReturnValue` — the single signed-32-bit VM <-> native ABI (spec §6.4).

use num_enum::{IntoPrimitive, TryFromPrimitive};

const MS_DELAY_MIN: i32 = -6_000_000;
const MS_DELAY_MAX: i32 = -1;
const RETURN_COUNT_MAX: i32 = 999;
const FUNCTION_START: i32 = 1000;
const FINISHED: i32 = 1001;
const TERMINATED: i32 = 1002;
const WAIT_FOR_EVENT: i32 = 1003;
const YIELD: i32 = 1004;
const ERROR_BASE: i32 = 2000;

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum ErrorCode {
    WrongNumberOfParams = 0,
    ConstructorOnly,
    Unimplemented,
    OutOfRange,
    MissingThis,
    InternalError,
    PropertyDoesNotExist,
    BadFormatString,
    UnknownFormatSpecifier,
    CannotConvertStringToNumber,
    CannotCreateArgumentsArray,
    CannotCall,
    InvalidArgumentValue,
    SyntaxErrors,
    ImportTimeout,
    DelayNotAllowedInImport,
    EventNotAllowedInImport,
    Error,
}

/// Decoded form of the wire `CallReturnValue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallReturnValue {
    /// Re-insert the yielding task after this many milliseconds.
    MsDelay(u32),
    /// The native function pushed this many return values on the stack.
    ReturnCount(u8),
    /// The VM took over execution (a scripted function was entered).
    FunctionStart,
    Finished,
    Terminated,
    WaitForEvent,
    Yield,
    Error(ErrorCode),
}

impl CallReturnValue {
    pub fn encode(self) -> i32 {
        match self {
            CallReturnValue::MsDelay(ms) => {
                let v = -(ms as i64).clamp(1, -(MS_DELAY_MIN as i64));
                v as i32
            }
            CallReturnValue::ReturnCount(n) => n as i32,
            CallReturnValue::FunctionStart => FUNCTION_START,
            CallReturnValue::Finished => FINISHED,
            CallReturnValue::Terminated => TERMINATED,
            CallReturnValue::WaitForEvent => WAIT_FOR_EVENT,
            CallReturnValue::Yield => YIELD,
            CallReturnValue::Error(code) => ERROR_BASE + i32::from(u8::from(code) as i32),
        }
    }

    pub fn decode(v: i32) -> Option<Self> {
        match v {
            MS_DELAY_MIN..=MS_DELAY_MAX => Some(CallReturnValue::MsDelay((-v) as u32)),
            0..=RETURN_COUNT_MAX => Some(CallReturnValue::ReturnCount(v as u8)),
            FUNCTION_START => Some(CallReturnValue::FunctionStart),
            FINISHED => Some(CallReturnValue::Finished),
            TERMINATED => Some(CallReturnValue::Terminated),
            WAIT_FOR_EVENT => Some(CallReturnValue::WaitForEvent),
            YIELD => Some(CallReturnValue::Yield),
            v if v >= ERROR_BASE => {
                let code = ErrorCode::try_from((v - ERROR_BASE) as u8).ok()?;
                Some(CallReturnValue::Error(code))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ms_delay_roundtrip() {
        let v = CallReturnValue::MsDelay(250);
        assert_eq!(CallReturnValue::decode(v.encode()), Some(v));
    }

    #[test]
    fn return_count_roundtrip() {
        let v = CallReturnValue::ReturnCount(2);
        assert_eq!(CallReturnValue::decode(v.encode()), Some(v));
    }

    #[test]
    fn error_roundtrip() {
        let v = CallReturnValue::Error(ErrorCode::PropertyDoesNotExist);
        assert_eq!(CallReturnValue::decode(v.encode()), Some(v));
    }

    #[test]
    fn sentinel_roundtrip() {
        for v in [
            CallReturnValue::FunctionStart,
            CallReturnValue::Finished,
            CallReturnValue::Terminated,
            CallReturnValue::WaitForEvent,
            CallReturnValue::Yield,
        ] {
            assert_eq!(CallReturnValue::decode(v.encode()), Some(v));
        }
    }
}

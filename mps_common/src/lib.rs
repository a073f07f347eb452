mod helpers;
mod money;

pub mod op;
mod secret;

pub use helpers::parse_boolean_flag;
pub use money::{
    AmountConversionError,
    Currency,
    MinorUnits,
    UnsupportedCurrencyError,
    DEFAULT_CURRENCY_CODE,
    DEFAULT_CURRENCY_CODE_LOWER,
};
pub use secret::Secret;

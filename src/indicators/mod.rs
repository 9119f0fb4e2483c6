// Derived display values computed from cached exchange data

pub mod moving_average;
pub mod virtual_balance;

pub use moving_average::{calculate_sma, sma_of_closes};
pub use virtual_balance::{calculate_virtual_balance, VALUATION_CURRENCY};

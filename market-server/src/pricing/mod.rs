//! Pricing Module

pub mod breakdown;

pub use breakdown::{BreakdownConfig, FinancialBreakdown, calculate_breakdown};

//! Calendar utilities: quarterly delivery schedule, contract codes, sessions.

pub mod contract;
pub mod delivery;
pub mod session;

pub use contract::{contract_code, contract_segments, infer_quarterly_contract, ContractSegment};
pub use delivery::{
    delivery_week_dates, quarterly_delivery_dates, third_friday, DeliverySchedule,
    QUARTERLY_MONTHS,
};
pub use session::{is_weekend, session_day_on_or_before, SessionPhase, TradingSession};

mod fanout_service;

pub use fanout_service::{
    FanoutConfig, FanoutOutcome, MessageFanoutDependencies, MessageFanoutService, BOT_APOLOGY,
};

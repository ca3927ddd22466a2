pub mod bus;
pub mod in_memory;
pub mod redpanda;

pub use bus::{
    dead_letter_topic, BusError, DeliveryPolicy, Disposition, MessageBus, MessageHandler,
    Subscription,
};
pub use in_memory::{InMemoryBus, TopicStats};
pub use redpanda::RedpandaBus;

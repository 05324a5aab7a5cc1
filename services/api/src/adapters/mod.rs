pub mod firefly;

pub use firefly::FireflyClient;

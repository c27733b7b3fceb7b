pub mod screenshots_repo;
pub mod signals_repo;
pub mod trades_repo;

pub use screenshots_repo::ScreenshotsRepository;
pub use signals_repo::SignalsRepository;
pub use trades_repo::TradesRepository;

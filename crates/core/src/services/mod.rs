pub mod batch_service;
pub mod mock_quotes;
pub mod pacer;
pub mod portfolio_service;
pub mod quote_service;
pub mod sector_classifier;

pub mod mock;
pub mod tavily;

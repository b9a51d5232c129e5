mod pool;

pub use pool::create_pool;

#[cfg(test)]
pub use pool::create_test_pool;

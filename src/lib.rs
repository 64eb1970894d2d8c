#[macro_use]
extern crate nonblock_logger;
#[macro_use]
extern crate async_trait;
#[allow(unused_imports)]
#[macro_use]
extern crate validator;
#[macro_use]
extern crate serde;

pub mod config;
pub mod gravatar;
pub mod migrations;
pub mod models;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

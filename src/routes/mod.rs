pub mod auth;
pub mod configs;
pub mod health;
pub mod scripts;
pub mod upload;

pub use auth::{callback_github, current_session, signin_github, signout};
pub use configs::{config_resource, list_configs};
pub use health::health_check;
pub use scripts::{list_scripts, script_action, script_source};
pub use upload::upload_config;

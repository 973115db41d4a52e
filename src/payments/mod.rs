pub mod robokassa;
pub mod state_machine;

pub mod audit;
pub mod branches;
pub mod check_ins;
pub mod events;
pub mod organizations;
pub mod users;

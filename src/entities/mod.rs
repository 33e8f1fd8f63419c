//! Entity module - Contains the SeaORM entity definitions for the database.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod operation;

pub use operation::{Column as OperationColumn, Entity as Operation, Model as OperationModel};

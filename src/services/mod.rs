pub mod cards;
pub mod transfers;

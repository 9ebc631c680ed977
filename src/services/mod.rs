pub mod ledger;
pub mod stations;

pub mod table;

pub use table::TableView;

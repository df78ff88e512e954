//! Resource definitions: row types, request DTOs and their column mapping.

pub mod banking_details;
pub mod brand;
pub mod cities;
pub mod countries;
pub mod customers;
pub mod instruments;
pub mod items;
pub mod lookups;
pub mod organizations;
pub mod payments;
pub mod permissions;
pub mod roles;
pub mod sales;
pub mod shipments;
pub mod shipping_agents;
pub mod users;
pub mod vendors;
pub mod warehouses;

pub use banking_details::BankingDetail;
pub use brand::Brand;
pub use cities::City;
pub use countries::Country;
pub use customers::Customer;
pub use instruments::Instrument;
pub use items::Item;
pub use lookups::{CapacityType, ItemType, Status};
pub use organizations::Organization;
pub use payments::Payment;
pub use permissions::Permission;
pub use roles::Role;
pub use sales::Sale;
pub use shipments::Shipment;
pub use shipping_agents::ShippingAgent;
pub use users::User;
pub use vendors::Vendor;
pub use warehouses::Warehouse;

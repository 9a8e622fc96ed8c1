pub use super::ads::Entity as Ads;
pub use super::pages::Entity as Pages;

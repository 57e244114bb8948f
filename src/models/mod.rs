pub mod aggregate;
pub mod line_item;
pub mod query;
pub mod stage;
pub mod user;

pub use aggregate::{Aggregate, AggregateDraft, AggregateUpdate, Contact, Delivery, DeliveryInput};
pub use line_item::{LineItem, LineItemBatch, LineItemDraft};
pub use query::{ListQuery, Page};
pub use stage::{Kind, Stage};
pub use user::{Login, Role, User, UserDraft, UserView, VerifyLogin};

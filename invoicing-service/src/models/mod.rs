//! Domain models for invoicing-service.

mod activity;
mod contact;
mod invoice;
mod line_item;

pub use activity::{ActivityType, InvoiceActivity};
pub use contact::Contact;
pub use invoice::{
    BulkAction, CreateInvoice, Invoice, InvoiceStatus, ListInvoicesFilter, PaymentData,
    UpdateInvoice,
};
pub use line_item::{LineItem, LineItemInput};

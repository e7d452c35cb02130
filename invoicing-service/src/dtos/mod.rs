//! Request/response types for the HTTP surface.

mod invoices;

pub use invoices::{
    ActivityResponse, BulkActionRequest, BulkActionResponse, CreateInvoiceRequest,
    InvoiceListParams, InvoiceListResponse, InvoiceResponse, LineItemRequest, LineItemResponse,
    MarkPaidRequest, SendInvoiceRequest, UpdateInvoiceRequest,
};

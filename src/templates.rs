// src/templates.rs
use crate::domain::{ChangeRequest, ChangeStatus};
use maud::{html, Markup, DOCTYPE};

/// Read-only staff dashboard: recent change requests, newest first.
pub fn dashboard_page(requests: &[ChangeRequest]) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                title { "Booking Changes" }
                style { (STYLES) }
            }
            body {
                h1 { "Booking change requests" }
                table {
                    thead {
                        tr {
                            th { "Created" }
                            th { "Booking" }
                            th { "Type" }
                            th { "Status" }
                            th { "Method" }
                            th { "Outcome" }
                        }
                    }
                    tbody {
                        @for req in requests {
                            tr {
                                td { (req.created_at.format("%Y-%m-%d %H:%M")) }
                                td {
                                    (req.booking_id) " (" (req.confirmation_code) ")"
                                    @if let Some(name) = &req.customer_name {
                                        br; small { (name) }
                                    }
                                }
                                td { (req.change_type.as_str()) }
                                td class=(status_class(req.status)) { (req.status.as_str()) }
                                td { (req.method.as_deref().unwrap_or("—")) }
                                td { (outcome_cell(req)) }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn outcome_cell(req: &ChangeRequest) -> Markup {
    html! {
        @if let Some(msg) = &req.result_message { (msg) }
        @if let Some(msg) = &req.error_message { (msg) }
        @if req.is_ota_booking {
            @if let Some(url) = &req.ota_portal_url {
                br;
                a href=(url) target="_blank" {
                    "Open " (req.ota_name.as_deref().unwrap_or("OTA")) " portal"
                }
            }
        }
    }
}

fn status_class(status: ChangeStatus) -> &'static str {
    match status {
        ChangeStatus::Pending => "pending",
        ChangeStatus::Processing => "processing",
        ChangeStatus::Completed => "completed",
        ChangeStatus::Failed => "failed",
    }
}

const STYLES: &str = "
    body { font-family: sans-serif; margin: 2rem; }
    table { border-collapse: collapse; width: 100%; }
    th, td { border: 1px solid #ddd; padding: 0.4rem 0.6rem; text-align: left; }
    td.completed { color: #0a7d33; }
    td.failed { color: #b00020; }
    td.processing, td.pending { color: #8a6d00; }
";

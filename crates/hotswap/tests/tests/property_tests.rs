#[path = "property/classification.rs"]
mod classification;

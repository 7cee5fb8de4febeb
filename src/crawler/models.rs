use serde::Serialize;

/// Seller identity resolved from one offer's user block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SellerInfo {
    pub author: String,
    pub author_type: String,
    pub phone: String,
    pub agent_name: String,
}

/// One fixed-width output row. Field order here is the CSV column order;
/// every field is always present, with the empty string standing in for
/// missing source data.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedRecord {
    pub author: String,
    pub author_type: String,
    pub agent_name: String,
    pub url: String,
    pub location: String,
    pub deal_type: String,
    pub accommodation_type: String,
    pub price: String,
    pub year_of_construction: String,
    pub house_material_type: String,
    pub heating_type: String,
    pub gas_type: String,
    pub water_supply_type: String,
    pub sewage_system: String,
    pub bathroom: String,
    pub living_meters: String,
    pub floors_count: String,
    pub phone: String,
    pub district: String,
    pub underground: String,
    pub street: String,
    pub house_number: String,
    pub creation_date: String,
}

/// Accumulated outcome of one harvest run. Appended to only by the harvest
/// loop; the caller judges success from the counters, not from an error.
#[derive(Debug, Default)]
pub struct HarvestReport {
    pub records: Vec<NormalizedRecord>,
    pub pages_attempted: u32,
    pub pages_with_data: u32,
    pub pages_empty: u32,
    pub pages_failed: u32,
    pub cancelled: bool,
}

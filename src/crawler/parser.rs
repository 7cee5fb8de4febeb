use chrono::{Local, LocalResult, NaiveDate, TimeZone};
use scraper::{Html, Selector};
use serde_json::Value;

use crate::config::ListingScope;
use crate::crawler::models::{NormalizedRecord, SellerInfo};

/// Span class markers inside the seller description fragment.
const SELLER_TYPE_CLASS: &str = "color_gray60_100";
const SELLER_NAME_CLASS: &str = "color_current_color";

/// Stand-in subtree for absent optional blocks.
static NULL: Value = Value::Null;

/// Flattens one raw offer into a fixed-width record. Total over any JSON
/// shape: every missing or malformed field degrades to its empty default
/// instead of failing the offer.
pub fn normalize_offer(offer: &Value, scope: &ListingScope) -> NormalizedRecord {
    let building = offer.get("building").unwrap_or(&NULL);
    let geo = offer.get("geo").unwrap_or(&NULL);
    let seller = extract_seller(offer);

    NormalizedRecord {
        author: seller.author,
        author_type: seller.author_type,
        agent_name: seller.agent_name,
        url: format!(
            "{}/{}/",
            scope.listing_url_base.trim_end_matches('/'),
            json_str(offer, "id")
        ),
        location: scope.location.clone(),
        deal_type: scope.deal_type.clone(),
        accommodation_type: scope.accommodation_type.clone(),
        price: offer
            .get("bargainTerms")
            .map(|terms| json_str(terms, "price"))
            .unwrap_or_default(),
        year_of_construction: json_str(building, "buildYear"),
        house_material_type: json_str(building, "materialType"),
        heating_type: json_str(building, "heatingType"),
        gas_type: json_str(building, "gasType"),
        water_supply_type: json_str(building, "waterSupplyType"),
        sewage_system: json_str(building, "sewerageType"),
        bathroom: json_str(offer, "bathroom"),
        living_meters: json_str(offer, "livingArea"),
        floors_count: json_str(building, "floorsCount"),
        phone: seller.phone,
        district: json_str(geo, "districtName"),
        underground: join_underground_names(geo),
        street: json_str(geo, "streetName"),
        house_number: json_str(geo, "houseNumber"),
        creation_date: normalize_creation_date(offer.get("creationDate")),
    }
}

/// Scalar lookup with an empty-string default. Numbers are rendered in
/// their decimal form so the output row stays uniformly textual.
pub fn json_str(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Creation timestamps arrive as epoch integers, numeric strings or
/// ISO-like strings depending on the offer. Epoch forms convert to a
/// calendar date in local time; ISO-like strings truncate to the date
/// part; anything else degrades to empty.
pub fn normalize_creation_date(value: Option<&Value>) -> String {
    match value {
        Some(Value::Number(n)) => n.as_i64().map(epoch_to_date).unwrap_or_default(),
        Some(Value::String(s)) if !s.is_empty() => {
            if s.chars().all(|c| c.is_ascii_digit()) {
                s.parse::<i64>().ok().map(epoch_to_date).unwrap_or_default()
            } else {
                iso_date_prefix(s)
            }
        }
        _ => String::new(),
    }
}

fn epoch_to_date(secs: i64) -> String {
    match Local.timestamp_opt(secs, 0) {
        LocalResult::Single(dt) => dt.format("%Y-%m-%d").to_string(),
        _ => String::new(),
    }
}

/// First ten characters of an ISO-like string, kept only when they form a
/// real calendar date.
fn iso_date_prefix(s: &str) -> String {
    let prefix: String = s.chars().take(10).collect();
    match NaiveDate::parse_from_str(&prefix, "%Y-%m-%d") {
        Ok(_) => prefix,
        Err(_) => String::new(),
    }
}

/// Resolves the seller identity for one offer, preferring the labeled
/// spans of the embedded description fragment over the structured fields.
pub fn extract_seller(offer: &Value) -> SellerInfo {
    let user = offer.get("user").unwrap_or(&NULL);

    let (author_type, name, id_label) = seller_identity(user).unwrap_or_else(|| {
        (
            json_str(user, "userType"),
            json_str(user, "name"),
            String::new(),
        )
    });

    SellerInfo {
        author: format!("{id_label} {name}").trim().to_string(),
        author_type,
        phone: first_phone(user),
        agent_name: json_str(user, "agentName"),
    }
}

/// Fragment path of the identity resolution. Deliberately one fallible
/// block: if it fails as a whole, type, name and the id label all fall
/// back together in the caller. Inside it, each missing span falls back
/// to its structured field on its own.
fn seller_identity(user: &Value) -> Option<(String, String, String)> {
    let description = user.get("description").and_then(Value::as_str).unwrap_or("");
    let fragment = Html::parse_fragment(description);
    let spans = Selector::parse("span").ok()?;

    let author_type = span_text(&fragment, &spans, SELLER_TYPE_CLASS)
        .unwrap_or_else(|| json_str(user, "userType"));
    let name = span_text(&fragment, &spans, SELLER_NAME_CLASS)
        .unwrap_or_else(|| json_str(user, "name"));

    let id = json_str(user, "id");
    let id_label = if id.is_empty() {
        String::new()
    } else {
        format!("ID {id}")
    };

    Some((author_type, name, id_label))
}

fn span_text(fragment: &Html, spans: &Selector, class_marker: &str) -> Option<String> {
    fragment.select(spans).find_map(|el| {
        let class = el.value().attr("class")?;
        if class.contains(class_marker) {
            Some(el.text().collect::<String>().trim().to_string())
        } else {
            None
        }
    })
}

fn first_phone(user: &Value) -> String {
    user.get("phones")
        .and_then(Value::as_array)
        .and_then(|phones| phones.first())
        .map(|phone| json_str(phone, "number"))
        .unwrap_or_default()
}

/// Station names of the geo block, comma-joined. Missing list flattens
/// to empty.
pub fn join_underground_names(geo: &Value) -> String {
    geo.get("undergrounds")
        .and_then(Value::as_array)
        .map(|stations| {
            stations
                .iter()
                .map(|station| json_str(station, "name"))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_scope() -> ListingScope {
        ListingScope {
            location: "Москва".to_string(),
            deal_type: "rent_long".to_string(),
            accommodation_type: "flat".to_string(),
            listing_url_base: "https://www.cian.ru/rent/flat".to_string(),
        }
    }

    fn sample_offer() -> Value {
        json!({
            "id": 123456,
            "creationDate": "2023-05-01T12:00:00",
            "bargainTerms": { "price": 55000 },
            "livingArea": "18.5",
            "bathroom": "combined",
            "building": {
                "buildYear": 1987,
                "materialType": "panel",
                "heatingType": "central",
                "gasType": "main",
                "waterSupplyType": "central",
                "sewerageType": "central",
                "floorsCount": 12
            },
            "geo": {
                "districtName": "Тверской",
                "streetName": "Тверская",
                "houseNumber": "4",
                "undergrounds": [
                    { "name": "Тверская" },
                    { "name": "Пушкинская" }
                ]
            },
            "user": {
                "id": 42,
                "userType": "agency",
                "name": "ООО Ромашка",
                "agentName": "Анна",
                "phones": [ { "number": "+79990001122" } ]
            }
        })
    }

    #[test]
    fn normalizes_full_offer() {
        let record = normalize_offer(&sample_offer(), &test_scope());

        assert_eq!(record.url, "https://www.cian.ru/rent/flat/123456/");
        assert_eq!(record.location, "Москва");
        assert_eq!(record.deal_type, "rent_long");
        assert_eq!(record.accommodation_type, "flat");
        assert_eq!(record.price, "55000");
        assert_eq!(record.year_of_construction, "1987");
        assert_eq!(record.floors_count, "12");
        assert_eq!(record.living_meters, "18.5");
        assert_eq!(record.district, "Тверской");
        assert_eq!(record.underground, "Тверская, Пушкинская");
        assert_eq!(record.street, "Тверская");
        assert_eq!(record.house_number, "4");
        assert_eq!(record.creation_date, "2023-05-01");
        assert_eq!(record.phone, "+79990001122");
        assert_eq!(record.agent_name, "Анна");
    }

    #[test]
    fn empty_offer_yields_fully_shaped_record() {
        let record = normalize_offer(&json!({}), &test_scope());

        // Scope labels and the synthesized URL are always present.
        assert_eq!(record.location, "Москва");
        assert_eq!(record.url, "https://www.cian.ru/rent/flat//");

        // Everything sourced from the offer degrades to empty.
        assert_eq!(record.author, "");
        assert_eq!(record.author_type, "");
        assert_eq!(record.price, "");
        assert_eq!(record.underground, "");
        assert_eq!(record.creation_date, "");
    }

    #[test]
    fn normalization_is_idempotent() {
        let offer = sample_offer();
        let scope = test_scope();
        assert_eq!(
            normalize_offer(&offer, &scope),
            normalize_offer(&offer, &scope)
        );
    }

    #[test]
    fn epoch_integer_converts_to_calendar_date() {
        let date = normalize_creation_date(Some(&json!(1_700_000_000)));

        assert_eq!(date.len(), 10);
        assert_eq!(&date[4..5], "-");
        assert_eq!(&date[7..8], "-");
        // 1700000000 is mid-November 2023 UTC; local offsets shift at most
        // one day around the 14th.
        assert!(date.starts_with("2023-11-1"), "unexpected date: {date}");
    }

    #[test]
    fn numeric_string_epoch_matches_integer_epoch() {
        assert_eq!(
            normalize_creation_date(Some(&json!("1700000000"))),
            normalize_creation_date(Some(&json!(1_700_000_000)))
        );
    }

    #[test]
    fn iso_string_truncates_to_date() {
        assert_eq!(
            normalize_creation_date(Some(&json!("2023-05-01T12:00:00"))),
            "2023-05-01"
        );
    }

    #[test]
    fn unparseable_date_degrades_to_empty() {
        assert_eq!(normalize_creation_date(Some(&json!("not-a-date"))), "");
        assert_eq!(normalize_creation_date(Some(&json!("2023"))), "");
        assert_eq!(normalize_creation_date(Some(&json!(""))), "");
        assert_eq!(normalize_creation_date(Some(&json!(1.5))), "");
        assert_eq!(normalize_creation_date(Some(&Value::Null)), "");
        assert_eq!(normalize_creation_date(None), "");
    }

    #[test]
    fn out_of_range_epoch_degrades_to_empty() {
        assert_eq!(normalize_creation_date(Some(&json!(i64::MAX))), "");
    }

    #[test]
    fn seller_prefers_fragment_spans() {
        let offer = json!({
            "user": {
                "id": 42,
                "userType": "agency",
                "name": "ООО Ромашка",
                "description": "<div><span class=\"x color_gray60_100 y\">Собственник</span>\
                                <span class=\"color_current_color\">Иван</span></div>"
            }
        });

        let seller = extract_seller(&offer);
        assert_eq!(seller.author_type, "Собственник");
        assert_eq!(seller.author, "ID 42 Иван");
    }

    #[test]
    fn seller_falls_back_to_structured_fields() {
        let offer = json!({
            "user": {
                "id": 42,
                "userType": "agency",
                "name": "ООО Ромашка",
                "description": "plain text without any spans"
            }
        });

        let seller = extract_seller(&offer);
        assert_eq!(seller.author_type, "agency");
        assert_eq!(seller.author, "ID 42 ООО Ромашка");
    }

    #[test]
    fn seller_spans_fall_back_independently() {
        // Only the type span is present; the name still comes from the
        // structured field.
        let offer = json!({
            "user": {
                "id": 7,
                "userType": "agency",
                "name": "ООО Ромашка",
                "description": "<span class=\"color_gray60_100\">Агентство</span>"
            }
        });

        let seller = extract_seller(&offer);
        assert_eq!(seller.author_type, "Агентство");
        assert_eq!(seller.author, "ID 7 ООО Ромашка");
    }

    #[test]
    fn seller_without_id_has_no_id_prefix() {
        let offer = json!({
            "user": { "name": "Иван", "userType": "homeowner" }
        });

        let seller = extract_seller(&offer);
        assert_eq!(seller.author, "Иван");
        assert_eq!(seller.author_type, "homeowner");
    }

    #[test]
    fn missing_user_block_yields_empty_seller() {
        let seller = extract_seller(&json!({}));
        assert_eq!(seller, SellerInfo::default());
    }

    #[test]
    fn phone_takes_first_list_entry() {
        let offer = json!({
            "user": {
                "phones": [
                    { "number": "+70000000001" },
                    { "number": "+70000000002" }
                ]
            }
        });

        assert_eq!(extract_seller(&offer).phone, "+70000000001");
    }

    #[test]
    fn empty_phone_list_yields_empty_phone() {
        let offer = json!({ "user": { "phones": [] } });
        assert_eq!(extract_seller(&offer).phone, "");
    }

    #[test]
    fn renders_numeric_ids_and_strings_alike() {
        assert_eq!(json_str(&json!({ "id": 42 }), "id"), "42");
        assert_eq!(json_str(&json!({ "id": "42" }), "id"), "42");
        assert_eq!(json_str(&json!({ "id": null }), "id"), "");
        assert_eq!(json_str(&json!({}), "id"), "");
    }
}

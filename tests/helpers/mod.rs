//! Shared fixtures for database integration tests.

use lotsync::data::models::Candidate;

/// A fully populated candidate for `url`.
pub fn make_candidate(url: &str, vin: Option<&str>, stock: Option<&str>) -> Candidate {
    Candidate {
        vin: vin.map(str::to_owned),
        stock: stock.map(str::to_owned),
        year: Some(2016),
        make: Some("Porsche".to_owned()),
        model: Some("Cayman GT4".to_owned()),
        body_style: Some("Coupe".to_owned()),
        exterior_color: Some("Racing Yellow".to_owned()),
        interior_color: Some("Black".to_owned()),
        miles: Some(18_250),
        transmission: Some("6-Speed Manual".to_owned()),
        engine: Some("3.8L Flat-6".to_owned()),
        price: Some(98_500),
        price_raw: Some("$98,500".to_owned()),
        thumb: Some("https://cdn.example/gt4.jpg".to_owned()),
        ..Candidate::new(url)
    }
}

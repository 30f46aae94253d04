use anyhow::Result;
use regex::Regex;

/// Phrases in listing text that suggest an oceanfront property.
pub const BEACH_KEYWORDS: &[&str] = &[
    "frente ao mar",
    "frente à praia",
    "vista para o mar",
    "beira mar",
    "pé na areia",
    "primeira linha",
    "orla",
    "waterfront",
    "beachfront",
    "ocean view",
    "sea view",
    "beach view",
    "praia em frente",
];

const IMAGE_BEACH_TERMS: &[&str] = &["beach", "ocean", "sea", "praia", "mar", "water", "coast"];

const KNOWN_MUNICIPALITIES: &[&str] = &[
    "Itacuruçá",
    "Mangaratiba",
    "Angra dos Reis",
    "Paraty",
    "Búzios",
    "Cabo Frio",
    "Arraial do Cabo",
    "Saquarema",
    "Maricá",
    "Niterói",
    "Rio de Janeiro",
];

/// Parse a Brazilian-formatted amount ("1.079,00", "1.079", "250,5", "250").
pub fn parse_brl_amount(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let normalized = if raw.contains(',') && raw.contains('.') {
        raw.replace('.', "").replace(',', ".")
    } else if raw.contains(',') {
        raw.replace(',', ".")
    } else if raw.contains('.') && raw.rsplit('.').next().map(str::len) == Some(3) {
        raw.replace('.', "")
    } else {
        raw.to_string()
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeachfrontSignal {
    pub is_beachfront: bool,
    pub confidence: f64,
    pub evidence: Vec<String>,
}

/// Score how likely a listing is beachfront from its text and its images
/// (`(src, alt)` pairs). One point per keyword, half a point per image hint,
/// confidence is `10 × score` capped at 100 and 30 is the beachfront cut-off.
pub fn beachfront_signal(text: &str, images: &[(String, String)]) -> BeachfrontSignal {
    let text = text.to_lowercase();
    let mut score = 0.0;
    let mut evidence = Vec::new();

    for keyword in BEACH_KEYWORDS {
        if text.contains(keyword) {
            score += 1.0;
            evidence.push(keyword.to_string());
        }
    }

    for (src, alt) in images {
        let src = src.to_lowercase();
        let alt = alt.to_lowercase();
        for term in IMAGE_BEACH_TERMS {
            if alt.contains(term) || src.contains(term) {
                score += 0.5;
                evidence.push(format!("image hint: {}", term));
            }
        }
    }

    let confidence = (score * 10.0_f64).min(100.0);

    BeachfrontSignal {
        is_beachfront: confidence >= 30.0,
        confidence,
        evidence,
    }
}

/// Compiled regex set for pulling prices, ratings and locations out of
/// listing markup.
pub struct ListingExtractor {
    search_price_patterns: Vec<Regex>,
    rating_patterns: Vec<Regex>,
    bare_rating: Regex,
    stay_total_patterns: Vec<Regex>,
    per_night_patterns: Vec<Regex>,
    known_municipality: Regex,
    city_with_state: Regex,
    room_url: Regex,
}

impl ListingExtractor {
    pub fn new() -> Result<Self> {
        let amount = r"([0-9]{1,3}(?:\.[0-9]{3})*(?:,[0-9]{2})?)";

        let search_price_patterns = [
            r"(?i)R\$\s*(\d{1,4}(?:[.,]\d{3})*(?:[.,]\d{2})?)",
            r"(?i)(\d{2,4})\s*(?:por\s*noite|/\s*noite)",
            r"(?i)Total\s*R\$\s*(\d+)",
            r"(?i)(\d{2,4})\s*reais?",
            r"(?i)\$\s*(\d{2,4})",
            r"(?im)(?:^|\s)(\d{2,4})\s*(?:$|por|/)",
        ]
        .iter()
        .map(|p| Regex::new(p))
        .collect::<Result<Vec<_>, _>>()?;

        let rating_patterns = [
            r"(?i)(\d+[.,]\d+)\s*\(\s*(\d+)\s*avalia[çc][õo]es?\)",
            r"(\d+[.,]\d+)\s*★\s*\(\s*(\d+)\s*\)",
            r"★\s*(\d+[.,]\d+)\s*\(\s*(\d+)\s*\)",
            r"(?i)(\d+[.,]\d+)\s*estrelas?\s*\(\s*(\d+)\s*\)",
        ]
        .iter()
        .map(|p| Regex::new(p))
        .collect::<Result<Vec<_>, _>>()?;

        let stay_total_patterns = vec![
            Regex::new(&format!(r"(?i)R\$\s*{}\s*por\s*\d+\s*noites", amount))?,
            Regex::new(&format!(r"(?i)R\$\s*{}\s*total", amount))?,
            Regex::new(&format!(r"(?i)Total\s*R\$\s*{}", amount))?,
            Regex::new(r#""totalPrice"[^}]*?"amount"\D*([0-9]+)"#)?,
            Regex::new(r"(?i)([0-9]{1,3}(?:\.[0-9]{3})+)\s*para\s*[0-9]+\s*noites?")?,
        ];

        let per_night_patterns = vec![
            Regex::new(&format!(r"(?i)R\$\s*{}\s*por\s*noite", amount))?,
            Regex::new(&format!(r"(?i)R\$\s*{}\s*/\s*noite", amount))?,
            Regex::new(r#""basePrice"[^}]*?"amount"\D*([0-9]+)"#)?,
            Regex::new(r"(?i)([0-9]{2,4})\s*por\s*noite")?,
        ];

        let known = KNOWN_MUNICIPALITIES.join("|");

        Ok(Self {
            search_price_patterns,
            rating_patterns,
            bare_rating: Regex::new(r"(\d+[.,]\d+)")?,
            stay_total_patterns,
            per_night_patterns,
            known_municipality: Regex::new(&format!("(?i)({})", known))?,
            city_with_state: Regex::new(
                r"(\p{Lu}\p{Ll}+(?:\s+\p{Lu}\p{Ll}+)*),\s*(?:RJ|SP|MG|ES|PR|SC|RS|BA|PE|CE)\b",
            )?,
            room_url: Regex::new(r"/rooms/[0-9]+")?,
        })
    }

    /// First price found in a search-result card that falls within
    /// `[min_price, max_price]`. Patterns are tried in priority order.
    pub fn search_card_price(&self, text: &str, min_price: f64, max_price: f64) -> Option<f64> {
        for pattern in &self.search_price_patterns {
            for cap in pattern.captures_iter(text) {
                if let Some(price) = parse_brl_amount(&cap[1]) {
                    if (min_price..=max_price).contains(&price) {
                        return Some(price);
                    }
                }
            }
        }
        None
    }

    /// Returns `(rating, review_count)`; `(0.0, 0)` when unknown.
    pub fn rating(&self, text: &str) -> (f64, u32) {
        for pattern in &self.rating_patterns {
            if let Some(cap) = pattern.captures(text) {
                let rating = cap[1].replace(',', ".").parse::<f64>().unwrap_or(0.0);
                let reviews = cap[2].parse::<u32>().unwrap_or(0);
                if (0.0..=5.0).contains(&rating) {
                    return (rating, reviews);
                }
            }
        }

        // Bare score with no review count
        if let Some(cap) = self.bare_rating.captures(text) {
            if let Ok(rating) = cap[1].replace(',', ".").parse::<f64>() {
                if (1.0..=5.0).contains(&rating) {
                    return (rating, 0);
                }
            }
        }

        (0.0, 0)
    }

    /// Nightly price from a listing page: a total for the stay divided by the
    /// nights, else an explicit per-night figure.
    pub fn stay_price(&self, text: &str, nights: i64) -> Option<f64> {
        if nights > 0 {
            for pattern in &self.stay_total_patterns {
                if let Some(total) = pattern.captures(text).and_then(|c| parse_brl_amount(&c[1])) {
                    if (100.0..=50_000.0).contains(&total) {
                        return Some(total / nights as f64);
                    }
                }
            }
        }

        for pattern in &self.per_night_patterns {
            if let Some(price) = pattern.captures(text).and_then(|c| parse_brl_amount(&c[1])) {
                if (50.0..=5_000.0).contains(&price) {
                    return Some(price);
                }
            }
        }

        None
    }

    /// Pick the municipality out of location-bearing snippets, known coastal
    /// towns first, then "City, UF".
    pub fn municipality<'a, I>(&self, snippets: I) -> Option<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let snippets: Vec<&str> = snippets.into_iter().collect();

        for snippet in &snippets {
            if let Some(m) = self.known_municipality.find(snippet) {
                let found = m.as_str().to_lowercase();
                if let Some(canonical) = KNOWN_MUNICIPALITIES
                    .iter()
                    .find(|name| name.to_lowercase() == found)
                {
                    return Some(canonical.to_string());
                }
            }
        }

        snippets.iter().find_map(|snippet| {
            self.city_with_state
                .captures(snippet)
                .map(|cap| cap[1].trim().to_string())
        })
    }

    /// `/rooms/<id>` path embedded anywhere in raw markup.
    pub fn room_path(&self, html: &str) -> Option<String> {
        self.room_url.find(html).map(|m| m.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_brl_amount() {
        assert_eq!(parse_brl_amount("1.079,00"), Some(1079.0));
        assert_eq!(parse_brl_amount("1.079"), Some(1079.0));
        assert_eq!(parse_brl_amount("250,50"), Some(250.5));
        assert_eq!(parse_brl_amount("320"), Some(320.0));
        assert_eq!(parse_brl_amount("abc"), None);
    }

    #[test]
    fn test_search_card_price_respects_bounds() {
        let extractor = ListingExtractor::new().unwrap();

        let price = extractor.search_card_price("Casa na praia R$ 450 por noite", 50.0, 2000.0);
        assert_eq!(price, Some(450.0));

        // R$ 12 is out of range, falls through to the per-night pattern
        let price = extractor.search_card_price("Taxa R$ 12 · 380 por noite", 50.0, 2000.0);
        assert_eq!(price, Some(380.0));

        assert_eq!(extractor.search_card_price("Sem preço", 50.0, 2000.0), None);
    }

    #[test]
    fn test_search_card_price_thousands_separator() {
        let extractor = ListingExtractor::new().unwrap();
        let price = extractor.search_card_price("R$ 1.250 noite", 50.0, 2000.0);
        assert_eq!(price, Some(1250.0));
    }

    #[test]
    fn test_rating_with_reviews() {
        let extractor = ListingExtractor::new().unwrap();
        assert_eq!(extractor.rating("4,87 (123 avaliações)"), (4.87, 123));
        assert_eq!(extractor.rating("★ 4.5 (12)"), (4.5, 12));
    }

    #[test]
    fn test_rating_unknown_is_zero() {
        let extractor = ListingExtractor::new().unwrap();
        assert_eq!(extractor.rating("Novo anúncio"), (0.0, 0));
        // 9.5 is not a valid star rating
        assert_eq!(extractor.rating("Nota 9.5"), (0.0, 0));
    }

    #[test]
    fn test_stay_price_prefers_total() {
        let extractor = ListingExtractor::new().unwrap();
        let price = extractor.stay_price("R$ 1.079,00 por 2 noites", 2);
        assert_eq!(price, Some(539.5));

        let price = extractor.stay_price("R$ 420 por noite", 2);
        assert_eq!(price, Some(420.0));

        assert_eq!(extractor.stay_price("consulte", 2), None);
    }

    #[test]
    fn test_municipality_known_town_first() {
        let extractor = ListingExtractor::new().unwrap();
        let found = extractor.municipality(["Apartamento em Petrópolis, RJ", "Casa em itacuruçá"]);
        assert_eq!(found.as_deref(), Some("Itacuruçá"));

        let found = extractor.municipality(["Apartamento em Petrópolis, RJ"]);
        assert_eq!(found.as_deref(), Some("Petrópolis"));

        assert_eq!(extractor.municipality(["nothing here"]), None);
    }

    #[test]
    fn test_beachfront_signal() {
        let images = vec![("https://a0.muscache.com/beach.jpg".to_string(), "Vista".to_string())];
        let signal = beachfront_signal("Casa Pé na Areia com vista para o mar", &images);

        // two keywords + one image hint
        assert!((signal.confidence - 25.0).abs() < 1e-9);
        assert!(!signal.is_beachfront);
        assert_eq!(signal.evidence.len(), 3);

        let signal = beachfront_signal("Beachfront, frente ao mar, beira mar", &[]);
        assert!(signal.is_beachfront);
        assert!((signal.confidence - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_room_path() {
        let extractor = ListingExtractor::new().unwrap();
        let html = r#"<a href="/rooms/123456?check_in=2026-01-01">x</a>"#;
        assert_eq!(extractor.room_path(html).as_deref(), Some("/rooms/123456"));
    }
}

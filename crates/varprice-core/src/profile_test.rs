use std::io::Write;

use super::*;

fn dim(key: &str, selector: &str) -> DimensionSelector {
    DimensionSelector {
        key: key.to_string(),
        selector: selector.to_string(),
    }
}

#[test]
fn default_profile_is_valid() {
    SiteProfile::default().validate().expect("default profile should validate");
}

#[test]
fn page_url_first_page_is_base_url() {
    let profile = SiteProfile::default();
    assert_eq!(
        profile.page_url("https://shop.example.com/shop/", 1),
        "https://shop.example.com/shop/"
    );
}

#[test]
fn page_url_path_style() {
    let profile = SiteProfile::default();
    assert_eq!(
        profile.page_url("https://shop.example.com/shop/", 3),
        "https://shop.example.com/shop/page/3/"
    );
    assert_eq!(
        profile.page_url("https://shop.example.com/shop", 2),
        "https://shop.example.com/shop/page/2/"
    );
}

#[test]
fn page_url_path_style_keeps_query() {
    let profile = SiteProfile::default();
    assert_eq!(
        profile.page_url("https://shop.example.com/shop/?orderby=price", 2),
        "https://shop.example.com/shop/page/2/?orderby=price"
    );
}

#[test]
fn page_url_query_style() {
    let profile = SiteProfile {
        pagination: PaginationStyle::Query {
            param: "product-page".to_string(),
        },
        ..SiteProfile::default()
    };
    assert_eq!(
        profile.page_url("https://shop.example.com/shop/", 2),
        "https://shop.example.com/shop/?product-page=2"
    );
    assert_eq!(
        profile.page_url("https://shop.example.com/shop/?orderby=price", 4),
        "https://shop.example.com/shop/?orderby=price&product-page=4"
    );
}

#[test]
fn parse_profile_fills_defaults_for_missing_fields() {
    let yaml = r#"
dimension_selectors:
  - key: location
    selector: 'select[name="attribute_pa_location"]'
  - key: width
    selector: 'select[name="attribute_pa_width"]'
currency_symbols: ["$"]
"#;
    let profile = parse_profile(yaml).expect("profile should parse");
    assert_eq!(profile.dimension_keys(), vec!["location", "width"]);
    assert_eq!(profile.currency_symbols, vec!["$"]);
    assert_eq!(profile.price_selector, ".summary .price");
    assert_eq!(
        profile.variation_price_selector,
        ".woocommerce-variation-price .price"
    );
    assert_eq!(profile.pagination, PaginationStyle::default());
}

#[test]
fn parse_profile_reads_query_pagination() {
    let yaml = r"
pagination:
  style: query
  param: product-page
";
    let profile = parse_profile(yaml).unwrap();
    assert_eq!(
        profile.pagination,
        PaginationStyle::Query {
            param: "product-page".to_string()
        }
    );
}

#[test]
fn validate_rejects_duplicate_dimension_keys() {
    let profile = SiteProfile {
        dimension_selectors: vec![dim("Width", "select#a"), dim("width", "select#b")],
        ..SiteProfile::default()
    };
    let err = profile.validate().unwrap_err();
    assert!(
        matches!(err, ConfigError::Validation(ref msg) if msg.contains("duplicate")),
        "got: {err:?}"
    );
}

#[test]
fn validate_rejects_reserved_dimension_key() {
    let profile = SiteProfile {
        dimension_selectors: vec![dim("price", "select#a")],
        ..SiteProfile::default()
    };
    assert!(profile.validate().is_err());
}

#[test]
fn validate_rejects_empty_dimension_selector() {
    let profile = SiteProfile {
        dimension_selectors: vec![dim("width", " ")],
        ..SiteProfile::default()
    };
    assert!(profile.validate().is_err());
}

#[test]
fn validate_rejects_empty_price_selector() {
    let profile = SiteProfile {
        price_selector: String::new(),
        ..SiteProfile::default()
    };
    let err = profile.validate().unwrap_err();
    assert!(matches!(err, ConfigError::Validation(ref msg) if msg.contains("price_selector")));
}

#[test]
fn validate_rejects_empty_variation_price_selector() {
    let profile = SiteProfile {
        variation_price_selector: " ".to_string(),
        ..SiteProfile::default()
    };
    let err = profile.validate().unwrap_err();
    assert!(
        matches!(err, ConfigError::Validation(ref msg) if msg.contains("variation_price_selector"))
    );
}

#[test]
fn validate_rejects_template_without_placeholder() {
    let profile = SiteProfile {
        pagination: PaginationStyle::Path {
            template: "/page/".to_string(),
        },
        ..SiteProfile::default()
    };
    assert!(profile.validate().is_err());
}

#[test]
fn validate_rejects_bad_placeholder_regex() {
    let profile = SiteProfile {
        placeholder_pattern: "(unclosed".to_string(),
        ..SiteProfile::default()
    };
    assert!(profile.validate().is_err());
}

#[test]
fn validate_rejects_zero_max_pages() {
    let profile = SiteProfile {
        max_pages: 0,
        ..SiteProfile::default()
    };
    assert!(profile.validate().is_err());
}

#[test]
fn placeholder_regex_is_case_insensitive_by_default() {
    let re = SiteProfile::default().placeholder_regex().unwrap();
    assert!(re.is_match("Choose an option"));
    assert!(re.is_match("SELECT SIZE"));
    assert!(!re.is_match("1200mm"));
}

#[test]
fn load_profile_reports_missing_file() {
    let err = load_profile(Path::new("/nonexistent/varprice/profile.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::ProfileFileIo { .. }), "got: {err:?}");
}

#[test]
fn load_profile_reads_file_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "price_selector: '.price .amount'").unwrap();
    writeln!(file, "max_pages: 3").unwrap();
    let profile = load_profile(file.path()).unwrap();
    assert_eq!(profile.price_selector, ".price .amount");
    assert_eq!(profile.max_pages, 3);
}

#[test]
fn load_profile_reports_parse_errors() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "max_pages: [not, a, number]").unwrap();
    let err = load_profile(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::ProfileFileParse(_)), "got: {err:?}");
}

//! Static word lists backing the input classifier.
//!
//! These are deliberately plain arrays: the classifier is a pure function
//! and its data must be auditable at a glance.

/// Common given names. A name+company row whose first token is here AND
/// whose company is a large global brand downgrades to WEAK identity.
pub const COMMON_FIRST_NAMES: &[&str] = &[
    "james", "mary", "john", "patricia", "robert", "jennifer", "michael", "linda", "david",
    "elizabeth", "william", "barbara", "richard", "susan", "joseph", "jessica", "thomas", "sarah",
    "charles", "karen", "christopher", "lisa", "daniel", "nancy", "matthew", "betty", "anthony",
    "sandra", "mark", "margaret", "donald", "ashley", "steven", "kimberly", "andrew", "emily",
    "paul", "donna", "joshua", "michelle", "kenneth", "carol", "kevin", "amanda", "brian",
    "melissa", "george", "deborah", "timothy", "stephanie", "ronald", "rebecca", "jason", "laura",
    "edward", "sharon", "jeffrey", "cynthia", "ryan", "kathleen", "jacob", "amy", "gary",
    "angela", "nicholas", "shirley", "eric", "anna", "jonathan", "brenda", "stephen", "pamela",
    "larry", "emma", "justin", "nicole", "scott", "helen", "brandon", "samantha", "benjamin",
    "katherine", "samuel", "christine", "gregory", "debra", "alexander", "rachel", "patrick",
    "carolyn", "frank", "janet", "raymond", "maria", "jack", "olivia", "dennis", "heather",
    "jerry", "diane", "tyler", "julie", "aaron", "joyce",
];

/// Large global brands. Combined with a common first name, these make a
/// person row highly ambiguous (thousands of "John Smith at Google").
pub const BIG_GLOBAL_BRANDS: &[&str] = &[
    "google", "apple", "microsoft", "amazon", "meta", "facebook", "netflix", "tesla", "ibm",
    "oracle", "salesforce", "adobe", "intel", "nvidia", "samsung", "sony", "toyota", "walmart",
    "target", "nike", "coca-cola", "pepsi", "mcdonald's", "starbucks", "disney", "uber", "airbnb",
    "linkedin", "twitter", "x", "spotify", "paypal", "visa", "mastercard", "jpmorgan", "goldman",
    "accenture", "deloitte", "pwc", "kpmg", "ey",
];

/// Free-mail domains. A well-formed email on one of these identifies a
/// mailbox, not an organization, so it never counts as a work email anchor.
pub const FREE_MAIL_DOMAINS: &[&str] = &[
    "gmail.com",
    "yahoo.com",
    "hotmail.com",
    "outlook.com",
    "aol.com",
    "icloud.com",
    "me.com",
    "mail.com",
    "gmx.com",
    "gmx.de",
    "proton.me",
    "protonmail.com",
    "zoho.com",
    "yandex.com",
    "yandex.ru",
    "live.com",
    "msn.com",
    "fastmail.com",
    "hey.com",
    "qq.com",
    "163.com",
];

/// Generic leading words that make a bare company name highly ambiguous.
pub const GENERIC_COMPANY_PREFIXES: &[&str] = &[
    "abc",
    "xyz",
    "best",
    "top",
    "premier",
    "global",
    "universal",
    "national",
    "digital",
    "tech",
];

/// Legal suffixes that mark a name string as company-shaped.
pub const LEGAL_SUFFIXES: &[&str] = &[
    "inc", "inc.", "llc", "ltd", "ltd.", "corp", "corp.", "corporation", "co", "co.", "group",
    "holdings", "gmbh", "ag", "sa", "bv", "nv", "plc", "pvt",
];

/// True when `domain` belongs to a free-mail provider.
pub fn is_free_mail_domain(domain: &str) -> bool {
    FREE_MAIL_DOMAINS.contains(&domain.to_ascii_lowercase().as_str())
}

/// True when any token of `name` is a legal company suffix.
pub fn has_legal_suffix(name: &str) -> bool {
    name.split_whitespace()
        .any(|token| LEGAL_SUFFIXES.contains(&token.trim_matches(',').to_ascii_lowercase().as_str()))
}

/// True when the company name starts with a generic prefix word.
pub fn has_generic_prefix(company: &str) -> bool {
    company
        .split_whitespace()
        .next()
        .map(|first| GENERIC_COMPANY_PREFIXES.contains(&first.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// True when the first token of `name` is a common given name.
pub fn has_common_first_name(name: &str) -> bool {
    name.split_whitespace()
        .next()
        .map(|first| COMMON_FIRST_NAMES.contains(&first.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// True when `company` is a large global brand.
pub fn is_big_brand(company: &str) -> bool {
    BIG_GLOBAL_BRANDS.contains(&company.trim().to_ascii_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_suffix_detection() {
        assert!(has_legal_suffix("Acme Inc"));
        assert!(has_legal_suffix("Maschinenbau GmbH"));
        assert!(has_legal_suffix("Acme, Inc."));
        assert!(!has_legal_suffix("Stripe"));
        assert!(!has_legal_suffix("Karri Saarinen"));
    }

    #[test]
    fn generic_prefix_detection() {
        assert!(has_generic_prefix("ABC Technologies"));
        assert!(has_generic_prefix("Global Solutions Ltd"));
        assert!(!has_generic_prefix("Stripe"));
    }

    #[test]
    fn free_mail_detection() {
        assert!(is_free_mail_domain("gmail.com"));
        assert!(is_free_mail_domain("GMAIL.COM"));
        assert!(!is_free_mail_domain("stripe.com"));
    }

    #[test]
    fn common_name_and_brand() {
        assert!(has_common_first_name("John Smith"));
        assert!(!has_common_first_name("Karri Saarinen"));
        assert!(is_big_brand("Google"));
        assert!(!is_big_brand("Linear"));
    }
}

//! Built-in heuristic tables
//!
//! These only seed the `Default` impls of the config sections; engines read
//! the tables from the configuration they are constructed with.

use crate::config::types::{PageType, PageTypeEntry, PlatformSignature};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// "contact/email/reach <Firstname Lastname>", then "<Firstname Lastname> - <Title>"
pub fn name_patterns() -> Vec<String> {
    strings(&[
        r"(?:[Cc]ontact|[Ee]-?mail|[Rr]each)\s+(?:(?:me|us)\s+)?(?:(?:at|via)\s+)?(?P<name>\p{Lu}\p{Ll}+\s+\p{Lu}\p{Ll}+)",
        r"(?P<name>\p{Lu}\p{Ll}+\s+\p{Lu}\p{Ll}+)\s*[-–—|]\s*\p{Lu}",
    ])
}

/// Multi-word titles precede the single words they contain
pub fn position_titles() -> Vec<String> {
    strings(&[
        // English
        "Chief Executive Officer",
        "Chief Technology Officer",
        "Chief Marketing Officer",
        "Managing Director",
        "Marketing Manager",
        "Sales Manager",
        "Office Manager",
        "Head of Marketing",
        "Head of Sales",
        "Co-Founder",
        "Founder",
        "CEO",
        "CTO",
        "CFO",
        "COO",
        "CMO",
        "President",
        "Owner",
        "Partner",
        "Director",
        "Manager",
        // Dutch
        "Algemeen Directeur",
        "Bedrijfsleider",
        "Zaakvoerder",
        "Oprichter",
        "Eigenaar",
        "Directeur",
        // German
        "Geschäftsführer",
        "Geschäftsführerin",
        "Inhaber",
        "Inhaberin",
        "Gründer",
        "Vorstand",
        "Leiter",
        // French
        "Directeur Général",
        "Directrice",
        "Fondateur",
        "Fondatrice",
        "Gérant",
        "Président",
        "Responsable",
        // Spanish
        "Director General",
        "Fundador",
        "Fundadora",
        "Gerente",
        "Propietario",
        "Socio",
    ])
}

pub fn page_types() -> Vec<PageTypeEntry> {
    let entry = |page_type, keywords: &[&str]| PageTypeEntry {
        page_type,
        keywords: strings(keywords),
    };

    vec![
        entry(
            PageType::Contact,
            &["contact", "kontakt", "contacto", "contactez", "neem-contact"],
        ),
        entry(
            PageType::About,
            &[
                "about",
                "over-ons",
                "overons",
                "ueber-uns",
                "uber-uns",
                "qui-sommes-nous",
                "a-propos",
                "sobre-nosotros",
                "quienes-somos",
            ],
        ),
        entry(
            PageType::Team,
            &["team", "equipe", "équipe", "equipo", "mitarbeiter", "medewerkers"],
        ),
        entry(
            PageType::Services,
            &["services", "diensten", "leistungen", "servicios"],
        ),
        entry(
            PageType::Careers,
            &["careers", "jobs", "vacatures", "karriere", "empleo", "carrieres"],
        ),
        entry(
            PageType::Blog,
            &["blog", "news", "nieuws", "aktuelles", "noticias", "actualites"],
        ),
        entry(
            PageType::Faq,
            &["faq", "veelgestelde-vragen", "haeufige-fragen", "preguntas-frecuentes"],
        ),
        entry(
            PageType::Privacy,
            &["privacy", "datenschutz", "privacidad", "confidentialite"],
        ),
        entry(
            PageType::Terms,
            &["terms", "voorwaarden", "agb", "conditions", "terminos"],
        ),
    ]
}

pub fn blocked_extensions() -> Vec<String> {
    strings(&[
        "png", "jpg", "jpeg", "gif", "svg", "webp", "bmp", "ico", "pdf", "doc", "docx", "xls",
        "xlsx", "ppt", "pptx", "zip", "rar", "gz", "tar", "mp3", "mp4", "avi", "mov", "css", "js",
    ])
}

pub fn platform_signatures() -> Vec<PlatformSignature> {
    let sig = |name: &str, markers: &[&str]| PlatformSignature {
        name: name.to_string(),
        markers: strings(markers),
    };

    vec![
        sig("WordPress", &["wp-content", "wp-includes"]),
        sig("Shopify", &["cdn.shopify.com", "shopify.theme"]),
        sig("Wix", &["static.wixstatic.com", "wix.com website builder"]),
        sig("Squarespace", &["static1.squarespace.com", "squarespace-cdn"]),
        sig("Webflow", &["webflow.js", "data-wf-site"]),
        sig("Joomla", &["/media/jui/", "joomla!"]),
        sig("Drupal", &["/sites/default/files", "drupal.settings"]),
        sig("Magento", &["mage/cookies", "magento_"]),
        sig("Ghost", &["ghost-portal", "content=\"ghost"]),
        sig("HubSpot", &["js.hs-scripts.com", "hs-sites"]),
    ]
}

pub fn disposable_domains() -> Vec<String> {
    strings(&[
        "10minutemail.com",
        "20minutemail.com",
        "33mail.com",
        "anonbox.net",
        "burnermail.io",
        "discard.email",
        "dispostable.com",
        "emailfake.com",
        "emailondeck.com",
        "fakeinbox.com",
        "getnada.com",
        "grr.la",
        "guerrillamail.com",
        "guerrillamailblock.com",
        "inboxkitten.com",
        "mailcatch.com",
        "maildrop.cc",
        "mailinator.com",
        "mailnesia.com",
        "mintemail.com",
        "moakt.com",
        "mohmal.com",
        "mytemp.email",
        "sharklasers.com",
        "spam4.me",
        "spamgourmet.com",
        "temp-mail.org",
        "tempinbox.com",
        "tempmail.com",
        "tempr.email",
        "throwawaymail.com",
        "tmail.ws",
        "trashmail.com",
        "yopmail.com",
    ])
}

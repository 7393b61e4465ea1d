//! The field table: every named field, its type and the labels it hides behind

/// How a raw extracted string is coerced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Floor,
    Flag,
    Coordinate,
}

/// A field read through the "label → following value" pattern
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Label synonyms, matched exactly after whitespace collapse
    pub labels: &'static [&'static str],
}

const fn labeled(
    name: &'static str,
    kind: FieldKind,
    labels: &'static [&'static str],
) -> FieldSpec {
    FieldSpec { name, kind, labels }
}

/// Detail fields located by their label on the property sheet
pub const LABELED_FIELDS: &[FieldSpec] = &[
    labeled("reference", FieldKind::Text, &["Riferimento Annuncio", "Riferimento annuncio", "Riferimento"]),
    labeled("contract", FieldKind::Text, &["Contratto", "Tipo Contratto", "Tipo contratto"]),
    labeled("property_type", FieldKind::Text, &["Tipologia", "Tipo Proprietà", "Tipo proprietà"]),
    labeled("category", FieldKind::Text, &["Categoria"]),
    labeled("city", FieldKind::Text, &["Città", "Comune"]),
    labeled("province", FieldKind::Text, &["Provincia"]),
    labeled("region", FieldKind::Text, &["Regione"]),
    labeled("zone", FieldKind::Text, &["Zona"]),
    labeled("neighborhood", FieldKind::Text, &["Quartiere"]),
    labeled("address", FieldKind::Text, &["Indirizzo"]),
    labeled("postal_code", FieldKind::Text, &["CAP", "Cap"]),
    labeled("price", FieldKind::Number, &["Prezzo", "Prezzo Affitto", "Prezzo affitto"]),
    labeled("sale_price", FieldKind::Number, &["Prezzo Vendita", "Prezzo vendita"]),
    labeled("condo_fees", FieldKind::Number, &["Spese condominio", "Spese Condominio"]),
    labeled("extra_costs", FieldKind::Number, &["Spese extra", "Spese Extra"]),
    labeled("deposit", FieldKind::Number, &["Cauzione", "Deposito cauzionale"]),
    labeled("surface", FieldKind::Number, &["Superficie"]),
    labeled("rooms", FieldKind::Number, &["Locali"]),
    labeled("bedrooms", FieldKind::Number, &["Camere da letto", "Camere"]),
    labeled("bathrooms", FieldKind::Number, &["Bagni", "Bagno"]),
    labeled("floor", FieldKind::Floor, &["Piano"]),
    labeled("floors_total", FieldKind::Number, &["Totale piani edificio", "Piani edificio"]),
    labeled("year_built", FieldKind::Number, &["Anno di costruzione", "Anno costruzione"]),
    labeled("condition", FieldKind::Text, &["Stato"]),
    labeled("energy_class", FieldKind::Text, &["Classe energetica", "Efficienza energetica", "Classe Energetica"]),
    labeled("heating", FieldKind::Text, &["Riscaldamento"]),
    labeled("air_conditioning", FieldKind::Text, &["Climatizzazione"]),
    labeled("elevator", FieldKind::Flag, &["Ascensore"]),
    labeled("furnished", FieldKind::Flag, &["Arredato"]),
    labeled("balcony", FieldKind::Flag, &["Balcone"]),
    labeled("terrace", FieldKind::Flag, &["Terrazzo", "Terrazza"]),
    labeled("basement", FieldKind::Flag, &["Cantina"]),
    labeled("garden", FieldKind::Text, &["Giardino"]),
    labeled("kitchen", FieldKind::Text, &["Cucina"]),
    labeled("parking", FieldKind::Text, &["Posti Auto", "Posti auto", "Box, posti auto", "Garage", "Box"]),
];

/// Fields with dedicated extraction strategies
pub const STRUCTURAL_FIELDS: &[(&str, FieldKind)] = &[
    ("title", FieldKind::Text),
    ("image", FieldKind::Text),
    ("description", FieldKind::Text),
    ("latitude", FieldKind::Coordinate),
    ("longitude", FieldKind::Coordinate),
    ("agency_name", FieldKind::Text),
];

/// Ordered keyword table for listing-card feature tags; first match wins
pub const FEATURE_KEYWORDS: &[(&str, &str)] = &[
    ("local", "rooms"),
    ("m²", "surface"),
    ("mq", "surface"),
    ("bagn", "bathrooms"),
    ("piano", "floor"),
    ("ascensore", "elevator"),
    ("balcon", "balcony"),
    ("arredat", "furnished"),
    ("cantina", "basement"),
    ("terrazz", "terrace"),
];

/// Every field name a flat record carries, in output order
pub fn field_names() -> impl Iterator<Item = &'static str> {
    STRUCTURAL_FIELDS
        .iter()
        .map(|(name, _)| *name)
        .chain(LABELED_FIELDS.iter().map(|spec| spec.name))
}

/// Looks up the coercion kind of a field by name
pub fn kind_of(name: &str) -> Option<FieldKind> {
    STRUCTURAL_FIELDS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, kind)| *kind)
        .or_else(|| {
            LABELED_FIELDS
                .iter()
                .find(|spec| spec.name == name)
                .map(|spec| spec.kind)
        })
}

/// Classifies a feature tag into a field name by keyword, case-insensitively
///
/// ```
/// use immo_harvest::extract::classify_feature;
///
/// assert_eq!(classify_feature("3 locali"), Some("rooms"));
/// assert_eq!(classify_feature("85 m²"), Some("surface"));
/// assert_eq!(classify_feature("Piano 2"), Some("floor"));
/// assert_eq!(classify_feature("Posto auto"), None);
/// ```
pub fn classify_feature(tag: &str) -> Option<&'static str> {
    let lowered = tag.to_lowercase();
    FEATURE_KEYWORDS
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, field)| *field)
}

//! Closed registry of field types.
//!
//! Every [`FieldType`] maps to a static [`FieldTypeDescriptor`] describing how
//! many raw sub-inputs the type decomposes into, which characters each
//! sub-input accepts, and how the sub-inputs join into one stored value.

use crate::error::{FormError, FormResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Joins the sub-inputs of composite types (card, account, iban, date).
pub const GROUP_DELIM: char = '-';
/// Thousands separator shown in amount inputs; never stored.
pub const AMOUNT_SEP: char = ',';

pub const SHAMSI_YEARS: RangeInclusive<u16> = 1390..=1409;
pub const DEFAULT_SHAMSI_YEAR: u16 = 1404;
pub const SHAMSI_MONTHS: [&str; 12] = [
    "فروردین",
    "اردیبهشت",
    "خرداد",
    "تیر",
    "مرداد",
    "شهریور",
    "مهر",
    "آبان",
    "آذر",
    "دی",
    "بهمن",
    "اسفند",
];
pub const SHAMSI_DAYS: RangeInclusive<u8> = 1..=31;
pub const IBAN_COUNTRY: &str = "IR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
    Amount,
    AccountNumber,
    CardNumber,
    Iban,
    Detail,
    ShamsiDate,
    Phone,
    NationalCode,
    MultiChoice,
}

impl FieldType {
    pub const ALL: [FieldType; 11] = [
        FieldType::Text,
        FieldType::Number,
        FieldType::Amount,
        FieldType::AccountNumber,
        FieldType::CardNumber,
        FieldType::Iban,
        FieldType::Detail,
        FieldType::ShamsiDate,
        FieldType::Phone,
        FieldType::NationalCode,
        FieldType::MultiChoice,
    ];

    /// Canonical persisted tag.
    pub fn tag(self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Amount => "amount",
            FieldType::AccountNumber => "account_number",
            FieldType::CardNumber => "card_number",
            FieldType::Iban => "iban",
            FieldType::Detail => "detail",
            FieldType::ShamsiDate => "shamsi_date",
            FieldType::Phone => "phone",
            FieldType::NationalCode => "national_code",
            FieldType::MultiChoice => "multi_choice",
        }
    }

    /// Display label shown in type pickers.
    pub fn label(self) -> &'static str {
        match self {
            FieldType::Text => "متن",
            FieldType::Number => "عدد",
            FieldType::Amount => "مبلغ",
            FieldType::AccountNumber => "شماره حساب",
            FieldType::CardNumber => "شماره کارت",
            FieldType::Iban => "شماره شبا",
            FieldType::Detail => "توضیحات",
            FieldType::ShamsiDate => "تاریخ شمسی",
            FieldType::Phone => "شماره تماس",
            FieldType::NationalCode => "کد ملی",
            FieldType::MultiChoice => "چند گزینه",
        }
    }

    /// Accepts either the canonical tag or the display label.
    pub fn from_tag(s: &str) -> FormResult<Self> {
        let s = s.trim();
        FieldType::ALL
            .iter()
            .copied()
            .find(|t| t.tag() == s || t.label() == s)
            .ok_or_else(|| FormError::UnknownFieldType(s.to_string()))
    }

    pub fn position(self) -> usize {
        FieldType::ALL.iter().position(|t| *t == self).unwrap_or(0)
    }

    /// Neighbour in [`FieldType::ALL`], wrapping around.
    pub fn cycle(self, delta: i32) -> FieldType {
        let n = FieldType::ALL.len() as i32;
        let idx = (self.position() as i32 + delta).rem_euclid(n);
        FieldType::ALL[idx as usize]
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for FieldType {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldType::from_tag(s)
    }
}

/// Source of the choices for a closed-choice sub-input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceSet {
    ShamsiYear,
    ShamsiMonth,
    ShamsiDay,
    /// Labels come from the option set bound to the field.
    OptionSet,
}

impl ChoiceSet {
    /// Built-in choices; `None` for option-set backed inputs.
    pub fn static_choices(self) -> Option<Vec<String>> {
        match self {
            ChoiceSet::ShamsiYear => Some(SHAMSI_YEARS.map(|y| y.to_string()).collect()),
            ChoiceSet::ShamsiMonth => Some(SHAMSI_MONTHS.iter().map(|m| m.to_string()).collect()),
            ChoiceSet::ShamsiDay => Some(SHAMSI_DAYS.map(|d| d.to_string()).collect()),
            ChoiceSet::OptionSet => None,
        }
    }

    pub fn default_index(self) -> usize {
        match self {
            ChoiceSet::ShamsiYear => (DEFAULT_SHAMSI_YEAR - SHAMSI_YEARS.start()) as usize,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFilter {
    FreeText,
    Multiline,
    Digits,
    /// Disabled sub-input carrying a constant value.
    Fixed(&'static str),
    Choice(ChoiceSet),
}

impl InputFilter {
    pub fn accepts(self, ch: char) -> bool {
        match self {
            InputFilter::FreeText => !ch.is_control(),
            InputFilter::Multiline => ch == '\n' || !ch.is_control(),
            InputFilter::Digits => is_digit(ch),
            InputFilter::Fixed(_) | InputFilter::Choice(_) => false,
        }
    }

    pub fn is_typed(self) -> bool {
        matches!(
            self,
            InputFilter::FreeText | InputFilter::Multiline | InputFilter::Digits
        )
    }

    pub fn is_fixed(self) -> bool {
        matches!(self, InputFilter::Fixed(_))
    }
}

/// ASCII or Extended Arabic-Indic (Persian) digit.
pub fn is_digit(ch: char) -> bool {
    ch.is_ascii_digit() || ('\u{06F0}'..='\u{06F9}').contains(&ch)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubInput {
    pub filter: InputFilter,
    pub max_len: Option<usize>,
}

impl SubInput {
    const fn new(filter: InputFilter, max_len: Option<usize>) -> Self {
        Self { filter, max_len }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayFormat {
    Plain,
    Thousands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldTypeDescriptor {
    pub field_type: FieldType,
    pub parts: &'static [SubInput],
    pub display: DisplayFormat,
}

impl FieldTypeDescriptor {
    pub fn arity(&self) -> usize {
        self.parts.len()
    }

    pub fn is_composite(&self) -> bool {
        self.parts.len() > 1
    }

    pub fn accepts(&self, part: usize, ch: char) -> bool {
        self.parts
            .get(part)
            .map(|p| p.filter.accepts(ch))
            .unwrap_or(false)
    }

    /// Render a raw sub-input value for display.
    pub fn display_value(&self, value: &str) -> String {
        match self.display {
            DisplayFormat::Plain => value.to_string(),
            DisplayFormat::Thousands => format_amount(value),
        }
    }

    /// Join sub-input values into the stored field value.
    pub fn encode(&self, parts: &[String]) -> String {
        if !self.is_composite() {
            let v = parts.first().map(String::as_str).unwrap_or("");
            return match self.display {
                DisplayFormat::Plain => v.to_string(),
                DisplayFormat::Thousands => strip_amount(v),
            };
        }
        let joined: Vec<&str> = self
            .parts
            .iter()
            .enumerate()
            .map(|(i, spec)| match spec.filter {
                InputFilter::Fixed(v) => v,
                _ => parts.get(i).map(String::as_str).unwrap_or(""),
            })
            .collect();
        joined.join(&GROUP_DELIM.to_string())
    }

    /// Split a stored field value back into sub-input values.
    ///
    /// Missing trailing groups come back empty. More groups than the arity, or
    /// a fixed group that does not match, fail with `AmbiguousDecode`.
    pub fn decode(&self, field: &str, value: &str) -> FormResult<Vec<String>> {
        if !self.is_composite() {
            return Ok(vec![match self.display {
                DisplayFormat::Plain => value.to_string(),
                DisplayFormat::Thousands => strip_amount(value),
            }]);
        }
        let groups: Vec<&str> = if value.is_empty() {
            Vec::new()
        } else {
            value.split(GROUP_DELIM).collect()
        };
        if groups.len() > self.arity() {
            return Err(FormError::AmbiguousDecode {
                field: field.to_string(),
                detail: format!(
                    "{} groups for a {} of {} parts",
                    groups.len(),
                    self.field_type.tag(),
                    self.arity()
                ),
            });
        }
        let mut out = Vec::with_capacity(self.arity());
        for (i, spec) in self.parts.iter().enumerate() {
            let g = groups.get(i).copied().unwrap_or("");
            match spec.filter {
                InputFilter::Fixed(fixed) => {
                    if !g.is_empty() && g != fixed {
                        return Err(FormError::AmbiguousDecode {
                            field: field.to_string(),
                            detail: format!("expected '{fixed}' prefix, found '{g}'"),
                        });
                    }
                    out.push(fixed.to_string());
                }
                _ => out.push(g.to_string()),
            }
        }
        Ok(out)
    }
}

/// Group digits by three from the right. Idempotent on grouped input.
pub fn format_amount(raw: &str) -> String {
    let digits: Vec<char> = raw.chars().filter(|c| is_digit(*c)).collect();
    let n = digits.len();
    let mut out = String::with_capacity(n + n / 3);
    for (i, ch) in digits.iter().enumerate() {
        if i > 0 && (n - i) % 3 == 0 {
            out.push(AMOUNT_SEP);
        }
        out.push(*ch);
    }
    out
}

pub fn strip_amount(s: &str) -> String {
    s.chars().filter(|c| *c != AMOUNT_SEP).collect()
}

const FREE_TEXT: [SubInput; 1] = [SubInput::new(InputFilter::FreeText, None)];
const MULTILINE: [SubInput; 1] = [SubInput::new(InputFilter::Multiline, None)];
const DIGITS: [SubInput; 1] = [SubInput::new(InputFilter::Digits, None)];
const PHONE: [SubInput; 1] = [SubInput::new(InputFilter::Digits, Some(11))];
const NATIONAL_CODE: [SubInput; 1] = [SubInput::new(InputFilter::Digits, Some(10))];
const GROUP4: SubInput = SubInput::new(InputFilter::Digits, Some(4));
const FOUR_GROUPS: [SubInput; 4] = [GROUP4; 4];
const IBAN: [SubInput; 8] = [
    SubInput::new(InputFilter::Fixed(IBAN_COUNTRY), Some(2)),
    GROUP4,
    GROUP4,
    GROUP4,
    GROUP4,
    GROUP4,
    GROUP4,
    GROUP4,
];
const SHAMSI_DATE: [SubInput; 3] = [
    SubInput::new(InputFilter::Choice(ChoiceSet::ShamsiYear), None),
    SubInput::new(InputFilter::Choice(ChoiceSet::ShamsiMonth), None),
    SubInput::new(InputFilter::Choice(ChoiceSet::ShamsiDay), None),
];
const OPTION_CHOICE: [SubInput; 1] = [SubInput::new(InputFilter::Choice(ChoiceSet::OptionSet), None)];

pub fn descriptor(field_type: FieldType) -> FieldTypeDescriptor {
    let (parts, display): (&'static [SubInput], DisplayFormat) = match field_type {
        FieldType::Text => (&FREE_TEXT, DisplayFormat::Plain),
        FieldType::Detail => (&MULTILINE, DisplayFormat::Plain),
        FieldType::Number => (&DIGITS, DisplayFormat::Plain),
        FieldType::Amount => (&DIGITS, DisplayFormat::Thousands),
        FieldType::Phone => (&PHONE, DisplayFormat::Plain),
        FieldType::NationalCode => (&NATIONAL_CODE, DisplayFormat::Plain),
        FieldType::AccountNumber | FieldType::CardNumber => (&FOUR_GROUPS, DisplayFormat::Plain),
        FieldType::Iban => (&IBAN, DisplayFormat::Plain),
        FieldType::ShamsiDate => (&SHAMSI_DATE, DisplayFormat::Plain),
        FieldType::MultiChoice => (&OPTION_CHOICE, DisplayFormat::Plain),
    };
    FieldTypeDescriptor {
        field_type,
        parts,
        display,
    }
}

pub fn descriptor_for(type_tag: &str) -> FormResult<FieldTypeDescriptor> {
    Ok(descriptor(FieldType::from_tag(type_tag)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    #[test]
    fn tags_and_labels_resolve_to_same_type() {
        for t in FieldType::ALL {
            assert_eq!(FieldType::from_tag(t.tag()).unwrap(), t);
            assert_eq!(FieldType::from_tag(t.label()).unwrap(), t);
        }
        assert_eq!(
            "  card_number ".parse::<FieldType>().unwrap(),
            FieldType::CardNumber
        );
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = descriptor_for("color").unwrap_err();
        assert_eq!(err, FormError::UnknownFieldType("color".into()));
    }

    #[test]
    fn arities_match_type_contracts() {
        let expect = [
            (FieldType::Text, 1),
            (FieldType::Detail, 1),
            (FieldType::Number, 1),
            (FieldType::Amount, 1),
            (FieldType::Phone, 1),
            (FieldType::NationalCode, 1),
            (FieldType::AccountNumber, 4),
            (FieldType::CardNumber, 4),
            (FieldType::Iban, 8),
            (FieldType::ShamsiDate, 3),
            (FieldType::MultiChoice, 1),
        ];
        for (t, n) in expect {
            assert_eq!(descriptor(t).arity(), n, "{t}");
        }
        assert_eq!(descriptor(FieldType::Phone).parts[0].max_len, Some(11));
        assert_eq!(descriptor(FieldType::NationalCode).parts[0].max_len, Some(10));
        assert_eq!(descriptor(FieldType::Number).parts[0].max_len, None);
    }

    #[test]
    fn card_number_encodes_and_decodes_in_order() {
        let d = descriptor(FieldType::CardNumber);
        let groups = s(&["1111", "2222", "3333", "4444"]);
        let enc = d.encode(&groups);
        assert_eq!(enc, "1111-2222-3333-4444");
        assert_eq!(d.decode("card", &enc).unwrap(), groups);
    }

    #[test]
    fn short_composite_value_pads_missing_groups() {
        let d = descriptor(FieldType::AccountNumber);
        assert_eq!(d.decode("acc", "12-34").unwrap(), s(&["12", "34", "", ""]));
        assert_eq!(d.decode("acc", "").unwrap(), s(&["", "", "", ""]));
    }

    #[test]
    fn too_many_groups_is_ambiguous() {
        let d = descriptor(FieldType::CardNumber);
        let err = d.decode("card", "1-2-3-4-5").unwrap_err();
        assert!(matches!(err, FormError::AmbiguousDecode { ref field, .. } if field == "card"));
    }

    #[test]
    fn iban_keeps_fixed_prefix() {
        let d = descriptor(FieldType::Iban);
        let mut parts = vec![String::new()];
        parts.extend(s(&["0120", "0000", "0000", "1234", "5678", "9012", "34"]));
        let enc = d.encode(&parts);
        assert_eq!(enc, "IR-0120-0000-0000-1234-5678-9012-34");
        let dec = d.decode("iban", &enc).unwrap();
        assert_eq!(dec[0], "IR");
        assert_eq!(dec[7], "34");
        assert!(d.decode("iban", "DE-1-2").is_err());
    }

    #[test]
    fn amount_formatting_is_idempotent_and_stored_plain() {
        assert_eq!(format_amount("1234567"), "1,234,567");
        assert_eq!(format_amount("1,234,567"), "1,234,567");
        assert_eq!(format_amount("123"), "123");
        assert_eq!(format_amount("1234"), "1,234");
        assert_eq!(format_amount(""), "");
        let d = descriptor(FieldType::Amount);
        assert_eq!(d.encode(&s(&["1,234,567"])), "1234567");
        assert_eq!(d.display_value("1234567"), "1,234,567");
    }

    #[test]
    fn digits_filter_accepts_persian_digits() {
        let d = descriptor(FieldType::Phone);
        assert!(d.accepts(0, '7'));
        assert!(d.accepts(0, '۷'));
        assert!(!d.accepts(0, '-'));
        assert!(!d.accepts(0, 'a'));
        assert!(!d.accepts(1, '7'));
        assert!(descriptor(FieldType::Detail).accepts(0, '\n'));
        assert!(!descriptor(FieldType::Text).accepts(0, '\n'));
    }

    #[test]
    fn shamsi_choices_cover_fixed_window() {
        let years = ChoiceSet::ShamsiYear.static_choices().unwrap();
        assert_eq!(years.first().map(String::as_str), Some("1390"));
        assert_eq!(years.last().map(String::as_str), Some("1409"));
        assert_eq!(years[ChoiceSet::ShamsiYear.default_index()], "1404");
        assert_eq!(ChoiceSet::ShamsiMonth.static_choices().unwrap().len(), 12);
        assert_eq!(ChoiceSet::ShamsiDay.static_choices().unwrap().len(), 31);
        assert!(ChoiceSet::OptionSet.static_choices().is_none());
    }

    #[test]
    fn cycle_wraps_around() {
        assert_eq!(FieldType::Text.cycle(-1), FieldType::MultiChoice);
        assert_eq!(FieldType::MultiChoice.cycle(1), FieldType::Text);
        assert_eq!(FieldType::Text.cycle(2), FieldType::Amount);
    }
}

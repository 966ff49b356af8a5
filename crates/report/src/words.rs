//! Cardinal numbers in words.

/// Converts an integer amount to words for the printed note.
pub trait NumberToWords: Send + Sync {
    fn cardinal(&self, value: i64) -> String;
}

/// Spanish cardinals (`1234` → `mil doscientos treinta y cuatro`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SpanishWords;

const UNITS: [&str; 30] = [
    "cero", "uno", "dos", "tres", "cuatro", "cinco", "seis", "siete", "ocho", "nueve", "diez",
    "once", "doce", "trece", "catorce", "quince", "dieciséis", "diecisiete", "dieciocho",
    "diecinueve", "veinte", "veintiuno", "veintidós", "veintitrés", "veinticuatro",
    "veinticinco", "veintiséis", "veintisiete", "veintiocho", "veintinueve",
];

const TENS: [&str; 10] = [
    "", "", "", "treinta", "cuarenta", "cincuenta", "sesenta", "setenta", "ochenta", "noventa",
];

const HUNDREDS: [&str; 10] = [
    "", "ciento", "doscientos", "trescientos", "cuatrocientos", "quinientos", "seiscientos",
    "setecientos", "ochocientos", "novecientos",
];

const MILLION: u64 = 1_000_000;
const BILLION: u64 = 1_000_000_000_000;

impl NumberToWords for SpanishWords {
    fn cardinal(&self, value: i64) -> String {
        let words = spell(value.unsigned_abs(), false);
        if value < 0 {
            format!("menos {words}")
        } else {
            words
        }
    }
}

/// `short` shortens a trailing "uno" to "un" (before mil, millón...).
fn spell(n: u64, short: bool) -> String {
    if n >= BILLION {
        return scaled(n / BILLION, n % BILLION, "billón", "billones");
    }
    if n >= MILLION {
        return scaled(n / MILLION, n % MILLION, "millón", "millones");
    }
    if n >= 1000 {
        let (high, rest) = (n / 1000, n % 1000);
        let head = if high == 1 {
            "mil".to_string()
        } else {
            format!("{} mil", spell(high, true))
        };
        return join(head, rest, short);
    }
    below_thousand(n, short)
}

fn scaled(high: u64, rest: u64, one: &str, many: &str) -> String {
    let head = if high == 1 {
        format!("un {one}")
    } else {
        format!("{} {many}", spell(high, true))
    };
    join(head, rest, false)
}

fn join(head: String, rest: u64, short: bool) -> String {
    if rest == 0 {
        head
    } else {
        format!("{head} {}", spell(rest, short))
    }
}

fn below_thousand(n: u64, short: bool) -> String {
    if n == 100 {
        return "cien".to_string();
    }
    let (hundreds, rest) = (n / 100, n % 100);
    if hundreds == 0 {
        return below_hundred(rest, short);
    }
    let head = HUNDREDS[hundreds as usize];
    if rest == 0 {
        head.to_string()
    } else {
        format!("{head} {}", below_hundred(rest, short))
    }
}

fn below_hundred(n: u64, short: bool) -> String {
    let word = if n < 30 {
        UNITS[n as usize].to_string()
    } else {
        let (tens, units) = (n / 10, n % 10);
        if units == 0 {
            TENS[tens as usize].to_string()
        } else {
            format!("{} y {}", TENS[tens as usize], UNITS[units as usize])
        }
    };

    if !short {
        return word;
    }
    if word == "veintiuno" {
        "veintiún".to_string()
    } else if let Some(stem) = word.strip_suffix("uno") {
        format!("{stem}un")
    } else {
        word
    }
}

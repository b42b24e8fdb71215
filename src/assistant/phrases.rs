use crate::locale::Locale;

pub fn greeting(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "Hello! I'm Ilex AI. How can I help you transform your space today?",
        Locale::Ru => "Здравствуйте! Я Ilex AI. Как я могу помочь вам преобразить ваше пространство сегодня?",
    }
}

/// Used when the completion endpoint succeeds but returns no text.
pub fn apology(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "I'm sorry, I couldn't generate a response.",
        Locale::Ru => "Извините, я не смог сформировать ответ.",
    }
}

const FILLERS_EN: [&str; 4] = [
    "That's a great choice! Our premium canvas material would look stunning for that.",
    "Production usually takes 3-5 business days. Do you need express shipping?",
    "I can help you with the dimensions. Have you checked our Calculator page?",
    "We offer a 100% satisfaction guarantee on all our art prints.",
];

const FILLERS_RU: [&str; 4] = [
    "Отличный выбор! Наш премиальный холст будет смотреться потрясающе.",
    "Производство обычно занимает 3-5 рабочих дней. Вам нужна экспресс-доставка?",
    "Я могу помочь с размерами. Вы уже пробовали наш Калькулятор?",
    "Мы предоставляем 100% гарантию качества на все наши художественные принты.",
];

pub fn fillers(locale: Locale) -> &'static [&'static str] {
    match locale {
        Locale::En => &FILLERS_EN,
        Locale::Ru => &FILLERS_RU,
    }
}

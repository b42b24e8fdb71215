//! Offline replies used whenever the completion endpoint cannot answer.
//!
//! Buckets are tested in declaration order and the first keyword hit wins,
//! so "what is the price, hello" is a price question. Matching is plain
//! substring search on the lowercased input.

use crate::locale::Locale;
use super::phrases::fillers;
use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Price,
    Material,
    Delivery,
    Contact,
    Greeting,
}

const BUCKETS: [(Bucket, &[&str]); 5] = [
    (Bucket::Price, &["price", "cost", "much", "quote", "цена", "стоит"]),
    (Bucket::Material, &["material", "vinyl", "canvas", "материал", "холст"]),
    (Bucket::Delivery, &["delivery", "ship", "time", "доставка", "срок"]),
    (Bucket::Contact, &["contact", "phone", "email", "контакт", "телефон"]),
    (Bucket::Greeting, &["hello", "hi", "привет"]),
];

impl Bucket {
    pub const ALL: [Bucket; 5] = [
        Bucket::Price,
        Bucket::Material,
        Bucket::Delivery,
        Bucket::Contact,
        Bucket::Greeting,
    ];

    pub fn reply(&self, locale: Locale) -> &'static str {
        match (self, locale) {
            (Bucket::Price, Locale::En) =>
                "Prices depend on the material and size. For example, Premium Canvas is $45/m². You can use our Calculator page for an exact quote, or tell me your wall dimensions!",
            (Bucket::Price, Locale::Ru) =>
                "Цена зависит от материала и размера. Например, Премиум Холст стоит $45/м². Вы можете использовать Калькулятор для точного расчета или скажите мне размеры вашей стены!",
            (Bucket::Material, Locale::En) =>
                "We offer 4 premium materials: Premium Canvas, Self-Adhesive Vinyl, Digital Fresco, and Non-Woven Wallpaper. Canvas is great for art, while Vinyl is durable and washable.",
            (Bucket::Material, Locale::Ru) =>
                "Мы предлагаем 4 премиальных материала: Холст, Винил, Фреска и Флизелин. Холст идеален для картин, а Винил — прочный и моющийся.",
            (Bucket::Delivery, Locale::En) =>
                "Standard production time is 3-5 business days. We ship worldwide!",
            (Bucket::Delivery, Locale::Ru) =>
                "Стандартный срок производства 3-5 рабочих дней. Мы доставляем по всему миру!",
            (Bucket::Contact, Locale::En) =>
                "You can reach us at +1 (555) 123-4567 or hello@ilexart.com. Or visit the Contact page.",
            (Bucket::Contact, Locale::Ru) =>
                "Вы можете связаться с нами по телефону +1 (555) 123-4567 или email hello@ilexart.com.",
            (Bucket::Greeting, Locale::En) =>
                "Hello! How can I help you transform your walls today?",
            (Bucket::Greeting, Locale::Ru) =>
                "Здравствуйте! Как я могу помочь вам преобразить ваши стены сегодня?",
        }
    }
}

pub fn classify(text: &str) -> Option<Bucket> {
    let lower = text.to_lowercase();
    BUCKETS.iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(bucket, _)| *bucket)
}

pub fn resolve(text: &str, locale: Locale) -> String {
    resolve_with(text, locale, &mut rand::thread_rng())
}

pub fn resolve_with<R: Rng + ?Sized>(text: &str, locale: Locale, rng: &mut R) -> String {
    match classify(text) {
        Some(bucket) => bucket.reply(locale).to_string(),
        None => {
            let pool = fillers(locale);
            pool.choose(rng).copied().unwrap_or(pool[0]).to_string()
        }
    }
}

/// Every reply `resolve` can produce for `locale`.
pub fn known_replies(locale: Locale) -> Vec<&'static str> {
    Bucket::ALL.iter()
        .map(|b| b.reply(locale))
        .chain(fillers(locale).iter().copied())
        .collect()
}

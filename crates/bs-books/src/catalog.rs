/// Title used by the "add book" action
pub const NEW_BOOK_TITLE: &str = "New book";

const DEFAULT_TITLES: &[&str] = &[
    "Hilarious book-titles & authors",
    "A gossip on book-titles",
    "Pali book-titles and their brief designations",
    "Преступление и наказание",
    "Война и мир",
    "Анна Каренина",
    "Мастер и Маргарита",
    "Тихий Дон",
    "Доктор Живаго",
    "Братья Карамазовы",
    "Собачье сердце",
    "Невский проспект",
    "Идиот",
    "Старик и море",
    "451 градус по Фаренгейту",
    "1984",
    "Убить пересмешника",
    "Гарри Поттер и философский камень",
    "Дон Кихот",
    "Собрание сочинений А.С. Пушкина",
    "Тарас Бульба",
    "Мертвые души",
    "Герой нашего времени",
    "Капитанская дочка",
];

/// In-memory list of book titles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    titles: Vec<String>,
}

impl Catalog {
    pub fn new(titles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            titles: titles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    /// Titles containing `query`, ignoring case. An empty query matches everything.
    pub fn filter(&self, query: &str) -> Vec<&str> {
        let needle = query.to_lowercase();
        self.titles
            .iter()
            .filter(|title| title.to_lowercase().contains(&needle))
            .map(String::as_str)
            .collect()
    }

    pub fn add(&mut self, title: impl Into<String>) {
        self.titles.push(title.into());
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(DEFAULT_TITLES.iter().copied())
    }
}

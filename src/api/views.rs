//! Minimal server-side HTML rendering.
//!
//! Pages are small enough that a templating engine would be overkill; every
//! user-supplied value goes through [`escape`] before it reaches the markup.

use crate::api::flash::{Flash, FlashKind};
use crate::api::handlers::books::types::{Book, SortKey};

/// Escape text for safe interpolation into HTML.
#[must_use]
pub fn escape(value: &str) -> String {
    // Ampersand first so already-escaped entities are not double-escaped.
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn flash_banner(flash: Option<&Flash>) -> String {
    match flash {
        Some(flash) => {
            let class = match flash.kind {
                FlashKind::Success => "flash flash-success",
                FlashKind::Error => "flash flash-error",
            };
            format!(
                r#"<p class="{class}">{}</p>"#,
                escape(&flash.message)
            )
        }
        None => String::new(),
    }
}

fn layout(title: &str, flash: Option<&Flash>, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} | Shelfmark</title>
</head>
<body>
<header><h1><a href="/">Shelfmark</a></h1></header>
{flash}
<main>
{body}
</main>
</body>
</html>
"#,
        title = escape(title),
        flash = flash_banner(flash),
        body = body,
    )
}

#[must_use]
pub fn login_page(flash: Option<&Flash>) -> String {
    let body = r#"<h2>Log in</h2>
<form method="post" action="/login">
<label>Email <input type="email" name="email" required></label>
<label>Password <input type="password" name="password" required></label>
<button type="submit">Log in</button>
</form>
<p><a href="/auth/google">Sign in with Google</a></p>
<p>No account? <a href="/register">Register</a></p>"#;
    layout("Log in", flash, body)
}

#[must_use]
pub fn register_page(flash: Option<&Flash>) -> String {
    let body = r#"<h2>Register</h2>
<form method="post" action="/register">
<label>Email <input type="email" name="email" required></label>
<label>Password <input type="password" name="password" required></label>
<button type="submit">Register</button>
</form>
<p>Already registered? <a href="/login">Log in</a></p>"#;
    layout("Register", flash, body)
}

fn sort_links(current: SortKey) -> String {
    let mark = |key: SortKey| if key == current { " (current)" } else { "" };
    format!(
        r#"<nav class="sort">Sort by:
<a href="/book-tracker?sort=rating">rating{}</a>
<a href="/book-tracker?sort=title">title{}</a>
<a href="/book-tracker">date read{}</a>
</nav>"#,
        mark(SortKey::Rating),
        mark(SortKey::Title),
        mark(SortKey::DateRead),
    )
}

#[must_use]
pub fn book_list(books: &[Book], sort: SortKey, flash: Option<&Flash>, email: &str) -> String {
    let mut items = String::new();
    for book in books {
        items.push_str(&format!(
            r#"<li class="book">
<a href="/book/{id}"><img src="{cover}" alt="cover of {title}"></a>
<a href="/book/{id}">{title}</a> by {author} — rated {rating}, read {date}
</li>
"#,
            id = book.id,
            cover = escape(&book.cover_url),
            title = escape(&book.title),
            author = escape(&book.author),
            rating = book.rating,
            date = book.date_read_display(),
        ));
    }

    let shelf = if books.is_empty() {
        "<p>No books yet. Add the first one!</p>".to_string()
    } else {
        format!("<ul class=\"shelf\">\n{items}</ul>")
    };

    let body = format!(
        r#"<h2>Your shelf</h2>
<p class="account">{email} — <a href="/logout">log out</a></p>
{sort}
{shelf}
<p><a href="/add">Add a book</a></p>"#,
        email = escape(email),
        sort = sort_links(sort),
    );
    layout("Your shelf", flash, &body)
}

#[must_use]
pub fn book_detail(book: &Book) -> String {
    let notes = book
        .notes
        .as_deref()
        .map_or_else(String::new, |notes| format!("<p>{}</p>", escape(notes)));
    let body = format!(
        r#"<h2>{title}</h2>
<img src="{cover}" alt="cover of {title}">
<p>by {author}</p>
<p>Rated {rating} — read {date}</p>
{notes}
<p><a href="/edit/{id}">Edit</a></p>
<form method="post" action="/delete/{id}">
<button type="submit">Delete</button>
</form>
<p><a href="/book-tracker">Back to shelf</a></p>"#,
        id = book.id,
        title = escape(&book.title),
        cover = escape(&book.cover_url),
        author = escape(&book.author),
        rating = book.rating,
        date = book.date_read_display(),
    );
    layout(&book.title, None, &body)
}

fn book_fields(book: Option<&Book>) -> String {
    let title = book.map_or_else(String::new, |b| escape(&b.title));
    let author = book.map_or_else(String::new, |b| escape(&b.author));
    let notes = book
        .and_then(|b| b.notes.as_deref())
        .map_or_else(String::new, escape);
    let rating = book.map_or_else(String::new, |b| b.rating.to_string());
    let date = book.map_or_else(String::new, Book::date_read_display);
    format!(
        r#"<label>Title <input type="text" name="title" value="{title}" required></label>
<label>Author <input type="text" name="author" value="{author}" required></label>
<label>Notes <textarea name="notes">{notes}</textarea></label>
<label>Rating <input type="number" name="rating" step="0.25" value="{rating}" required></label>
<label>Date read <input type="date" name="date_read" value="{date}" required></label>"#,
    )
}

#[must_use]
pub fn add_form(flash: Option<&Flash>) -> String {
    let body = format!(
        r#"<h2>Add a book</h2>
<form method="post" action="/add">
{fields}
<button type="submit">Add</button>
</form>
<p><a href="/book-tracker">Back to shelf</a></p>"#,
        fields = book_fields(None),
    );
    layout("Add a book", flash, &body)
}

#[must_use]
pub fn edit_form(book: &Book) -> String {
    let body = format!(
        r#"<h2>Edit {title}</h2>
<form method="post" action="/edit/{id}">
{fields}
<label>Cover URL <input type="text" name="cover_url" value="{cover}"></label>
<button type="submit">Save</button>
</form>
<p><a href="/book/{id}">Back to book</a></p>"#,
        id = book.id,
        title = escape(&book.title),
        fields = book_fields(Some(book)),
        cover = escape(&book.cover_url),
    );
    layout("Edit book", None, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;
    use uuid::Uuid;

    fn book() -> Book {
        Book {
            id: Uuid::nil(),
            user_id: Uuid::nil(),
            title: "Dune <1965>".to_string(),
            author: "Frank & Herbert".to_string(),
            notes: Some("It's good".to_string()),
            rating: 4.5,
            date_read: date!(2024 - 01 - 06),
            cover_url: "/images/cover-fallback.jpg".to_string(),
        }
    }

    #[test]
    fn escape_covers_html_metacharacters() {
        assert_eq!(
            escape(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn book_list_escapes_user_data() {
        let books = [book()];
        let html = book_list(&books, SortKey::DateRead, None, "reader@example.com");
        assert!(html.contains("Dune &lt;1965&gt;"));
        assert!(html.contains("Frank &amp; Herbert"));
        assert!(!html.contains("Dune <1965>"));
    }

    #[test]
    fn book_list_empty_state() {
        let html = book_list(&[], SortKey::DateRead, None, "reader@example.com");
        assert!(html.contains("No books yet"));
    }

    #[test]
    fn detail_renders_notes_and_delete_form() {
        let html = book_detail(&book());
        assert!(html.contains("It&#39;s good"));
        assert!(html.contains(&format!("action=\"/delete/{}\"", Uuid::nil())));
    }

    #[test]
    fn edit_form_prefills_fields() {
        let html = edit_form(&book());
        assert!(html.contains("value=\"Dune &lt;1965&gt;\""));
        assert!(html.contains("value=\"2024-01-06\""));
        assert!(html.contains("value=\"4.5\""));
    }

    #[test]
    fn login_page_shows_flash() {
        let flash = Flash {
            kind: FlashKind::Error,
            message: "Please log in to view that resource".to_string(),
        };
        let html = login_page(Some(&flash));
        assert!(html.contains("flash-error"));
        assert!(html.contains("Please log in to view that resource"));
    }
}

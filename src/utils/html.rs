//! HTML bodies for account emails and the server-rendered pages.
//!
//! Pages are assembled with plain string formatting. Every interpolated value
//! that originates from the database or the caller goes through [`escape_html`].

use time::format_description::well_known::Rfc3339;

use crate::models::{Difficulty, TourCard, TourPage, User};

/// Escapes the five HTML-significant characters.
pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn email_shell(preheader: &str, heading: &str, body: &str, button_label: &str, url: &str) -> String {
    let current_year = time::OffsetDateTime::now_utc().year();
    let url = escape_html(url);

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Natours</title>
</head>
<body style="margin: 0; padding: 0; font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Helvetica, Arial, sans-serif; background-color: #f7f7f7;">

    <!-- This is a hidden preheader text. -->
    <div style="display:none;font-size:1px;color:#ffffff;line-height:1px;max-height:0px;max-width:0px;opacity:0;overflow:hidden;">
        {preheader}
    </div>

    <table width="100%" border="0" cellspacing="0" cellpadding="0" style="background-color: #f7f7f7;">
        <tr>
            <td align="center" style="padding: 20px;">
                <table width="600" border="0" cellspacing="0" cellpadding="0" style="max-width: 600px; width: 100%; background-color: #ffffff; border-radius: 3px;">
                    <tr>
                        <td style="padding: 30px 40px;">
                            <h2 style="margin: 0 0 20px 0; font-size: 22px; color: #333333;">{heading}</h2>
                            {body}
                            <p style="margin: 24px 0; text-align: center;">
                                <a href="{url}" style="display: inline-block; padding: 12px 25px; background-color: #55c57a; color: #ffffff; border-radius: 5px; text-decoration: none; font-weight: 600;">{button_label}</a>
                            </p>
                        </td>
                    </tr>
                    <tr>
                        <td align="center" style="padding: 20px 40px; border-top: 1px solid #eeeeee;">
                            <p style="margin: 0; font-size: 12px; color: #999999;">&copy; {current_year} Natours. All rights reserved.</p>
                        </td>
                    </tr>
                </table>
            </td>
        </tr>
    </table>
</body>
</html>"#
    )
}

/// Welcome email sent after signup, linking to the account page.
pub fn generate_welcome_email_html(first_name: &str, account_url: &str) -> String {
    let first_name = escape_html(first_name);
    let body = format!(
        r#"<p style="margin: 0 0 16px 0; font-size: 16px; line-height: 1.6; color: #555555;">Hi {first_name},</p>
                            <p style="margin: 0 0 16px 0; font-size: 16px; line-height: 1.6; color: #555555;">Welcome to Natours, we're glad to have you! We're all a big family here, so make sure to upload your user photo so we get to know you a bit better.</p>"#
    );
    email_shell(
        "Welcome to the Natours Family!",
        "Welcome to the Natours Family!",
        &body,
        "Upload user photo",
        account_url,
    )
}

/// Password reset email carrying the one-time reset link.
pub fn generate_password_reset_email_html(first_name: &str, reset_url: &str) -> String {
    use super::constant::PASSWORD_RESET_EXPIRY;

    let first_name = escape_html(first_name);
    let minutes = PASSWORD_RESET_EXPIRY.as_secs() / 60;
    let body = format!(
        r#"<p style="margin: 0 0 16px 0; font-size: 16px; line-height: 1.6; color: #555555;">Hi {first_name},</p>
                            <p style="margin: 0 0 16px 0; font-size: 16px; line-height: 1.6; color: #555555;">Forgot your password? Submit a PATCH request with your new password and passwordConfirm to the link below. The link is valid for {minutes} minutes.</p>
                            <p style="margin: 0 0 16px 0; font-size: 14px; color: #999999;">If you didn't forget your password, please ignore this email!</p>"#
    );
    email_shell(
        "Reset your Natours password",
        "Reset your password",
        &body,
        "Reset your password",
        reset_url,
    )
}

fn layout(title: &str, viewer: Option<&User>, main: &str) -> String {
    let nav = match viewer {
        Some(user) => format!(
            r#"<a class="nav__el" href="/me"><img class="nav__user-img" src="/static/img/users/{photo}" alt="Photo of {name}"><span>{first}</span></a>
      <a class="nav__el nav__el--logout" href="/api/v1/users/logout">Log out</a>"#,
            photo = escape_html(&user.photo),
            name = escape_html(&user.name),
            first = escape_html(user.first_name()),
        ),
        None => r#"<a class="nav__el" href="/login">Log in</a>"#.to_string(),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <link rel="stylesheet" href="/static/css/style.css">
  <title>Natours | {title}</title>
</head>
<body>
  <header class="header">
    <nav class="nav nav--tours"><a class="nav__el" href="/">All tours</a></nav>
    <nav class="nav nav--user">
      {nav}
    </nav>
  </header>
  <main class="main">
{main}
  </main>
  <footer class="footer"><p class="footer__copyright">&copy; Natours</p></footer>
</body>
</html>"#,
        title = escape_html(title),
    )
}

fn difficulty_label(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Easy => "easy",
        Difficulty::Medium => "medium",
        Difficulty::Difficult => "difficult",
    }
}

fn format_start(card: &TourCard) -> String {
    card.first_start
        .and_then(|d| d.format(&Rfc3339).ok())
        .map(|d| d.chars().take(10).collect())
        .unwrap_or_else(|| "TBA".to_string())
}

fn render_card(card: &TourCard) -> String {
    let start = card
        .start_location
        .as_ref()
        .and_then(|l| l.description.as_deref())
        .unwrap_or("Unknown");

    format!(
        r#"    <div class="card">
      <div class="card__header">
        <img class="card__picture-img" src="/static/img/tours/{cover}" alt="{name}">
        <h3 class="heading-tertirary"><span>{name}</span></h3>
      </div>
      <div class="card__details">
        <h4 class="card__sub-heading">{difficulty} {duration}-day tour</h4>
        <p class="card__text">{summary}</p>
        <div class="card__data"><span>{start}</span></div>
        <div class="card__data"><span>{date}</span></div>
        <div class="card__data"><span>{stops} stops</span></div>
        <div class="card__data"><span>{group} people</span></div>
      </div>
      <div class="card__footer">
        <p><span class="card__footer-value">${price}</span> <span class="card__footer-text">per person</span></p>
        <p class="card__ratings"><span class="card__footer-value">{avg}</span> <span class="card__footer-text">rating ({qty})</span></p>
        <a class="btn btn--green btn--small" href="/tour/{slug}">Details</a>
      </div>
    </div>"#,
        cover = escape_html(&card.image_cover),
        name = escape_html(&card.name),
        difficulty = difficulty_label(card.difficulty),
        duration = card.duration,
        summary = escape_html(&card.summary),
        start = escape_html(start),
        date = format_start(card),
        stops = card.stops,
        group = card.max_group_size,
        price = card.price,
        avg = card.ratings_average,
        qty = card.ratings_quantity,
        slug = escape_html(&card.slug),
    )
}

/// Grid of tour cards, used by the overview and "my tours" pages.
pub fn render_overview(title: &str, tours: &[TourCard], viewer: Option<&User>) -> String {
    let cards: Vec<String> = tours.iter().map(render_card).collect();
    let main = format!(
        "    <div class=\"card-container\">\n{}\n    </div>",
        cards.join("\n")
    );
    layout(title, viewer, &main)
}

pub fn render_tour_page(tour: &TourPage, viewer: Option<&User>) -> String {
    let card = &tour.card;

    let guides: String = tour
        .guides
        .iter()
        .map(|g| {
            format!(
                r#"      <div class="overview-box__detail"><img class="overview-box__img" src="/static/img/users/{}" alt="{}"><span class="overview-box__label">{}</span><span class="overview-box__text">{}</span></div>"#,
                escape_html(&g.photo),
                escape_html(&g.name),
                escape_html(&g.role),
                escape_html(&g.name),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let reviews: String = tour
        .reviews
        .iter()
        .map(|r| {
            format!(
                r#"      <div class="reviews__card"><div class="reviews__avatar"><img class="reviews__avatar-img" src="/static/img/users/{}" alt="{}"><h6 class="reviews__user">{}</h6></div><p class="reviews__text">{}</p><p class="reviews__rating">{} / 5</p></div>"#,
                escape_html(&r.photo),
                escape_html(&r.name),
                escape_html(&r.name),
                escape_html(&r.review),
                r.rating,
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let stops: String = tour
        .locations
        .iter()
        .map(|l| {
            format!(
                "      <li>Day {}: {}</li>",
                l.day.unwrap_or_default(),
                escape_html(l.description.as_deref().unwrap_or(""))
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let paragraphs: String = tour
        .description
        .as_deref()
        .unwrap_or("")
        .split('\n')
        .filter(|p| !p.trim().is_empty())
        .map(|p| format!("      <p class=\"description__text\">{}</p>", escape_html(p)))
        .collect::<Vec<_>>()
        .join("\n");

    let booking = match viewer {
        Some(_) => r#"<p class="cta__text">Ask a lead guide to book this tour for you.</p>"#,
        None => r#"<a class="btn btn--green span-all-rows" href="/login">Log in to book tour</a>"#,
    };

    let main = format!(
        r#"    <section class="section-header">
      <img class="header__hero-img" src="/static/img/tours/{cover}" alt="{name}">
      <h1 class="heading-primary"><span>{name} tour</span></h1>
      <div class="heading-box__detail"><span>{duration} days</span></div>
    </section>
    <section class="section-description">
      <div class="overview-box">
        <h2 class="heading-secondary">Quick facts</h2>
        <div class="overview-box__detail"><span class="overview-box__label">Next date</span><span class="overview-box__text">{date}</span></div>
        <div class="overview-box__detail"><span class="overview-box__label">Difficulty</span><span class="overview-box__text">{difficulty}</span></div>
        <div class="overview-box__detail"><span class="overview-box__label">Participants</span><span class="overview-box__text">{group} people</span></div>
        <div class="overview-box__detail"><span class="overview-box__label">Rating</span><span class="overview-box__text">{avg} / 5</span></div>
        <h2 class="heading-secondary">Your tour guides</h2>
{guides}
      </div>
      <div class="description-box">
        <h2 class="heading-secondary">About {name} tour</h2>
{paragraphs}
      </div>
    </section>
    <section class="section-map">
      <ul>
{stops}
      </ul>
    </section>
    <section class="section-reviews">
{reviews}
    </section>
    <section class="section-cta">
      <h2 class="heading-secondary">What are you waiting for?</h2>
      <p class="cta__text">{duration} days. 1 adventure. Infinite memories. Make it yours today!</p>
      {booking}
    </section>"#,
        cover = escape_html(&card.image_cover),
        name = escape_html(&card.name),
        duration = card.duration,
        date = format_start(card),
        difficulty = difficulty_label(card.difficulty),
        group = card.max_group_size,
        avg = card.ratings_average,
    );

    layout(&format!("{} Tour", card.name), viewer, &main)
}

pub fn render_login(viewer: Option<&User>) -> String {
    let main = r#"    <div class="login-form">
      <h2 class="heading-secondary ma-bt-lg">Log into your account</h2>
      <form class="form form--login" id="login-form">
        <div class="form__group"><label class="form__label" for="email">Email address</label><input class="form__input" id="email" type="email" required></div>
        <div class="form__group ma-bt-md"><label class="form__label" for="password">Password</label><input class="form__input" id="password" type="password" required minlength="8"></div>
        <div class="form__group"><button class="btn btn--green">Login</button></div>
      </form>
    </div>
    <script>
      document.getElementById('login-form').addEventListener('submit', async (e) => {
        e.preventDefault();
        const res = await fetch('/api/v1/users/login', {
          method: 'POST',
          headers: { 'Content-Type': 'application/json' },
          body: JSON.stringify({ email: document.getElementById('email').value, password: document.getElementById('password').value }),
        });
        if (res.ok) window.location.assign('/');
        else alert((await res.json()).message);
      });
    </script>"#;
    layout("Log into your account", viewer, main)
}

pub fn render_account(user: &User, notice: Option<&str>) -> String {
    let notice = notice
        .map(|n| format!("      <div class=\"alert alert--success\">{}</div>\n", escape_html(n)))
        .unwrap_or_default();

    let main = format!(
        r#"    <div class="user-view">
      <nav class="user-view__menu">
        <ul class="side-nav">
          <li class="side-nav--active"><a href="/me">Settings</a></li>
          <li><a href="/my-tours">My bookings</a></li>
        </ul>
      </nav>
      <div class="user-view__content">
{notice}      <h2 class="heading-secondary ma-bt-md">Your account settings</h2>
        <form class="form form-user-data" action="/submit-user-data" method="POST">
          <div class="form__group"><label class="form__label" for="name">Name</label><input class="form__input" id="name" name="name" type="text" value="{name}" required></div>
          <div class="form__group ma-bt-md"><label class="form__label" for="email">Email address</label><input class="form__input" id="email" name="email" type="email" value="{email}" required></div>
          <div class="form__group right"><button class="btn btn--small btn--green">Save settings</button></div>
        </form>
      </div>
    </div>"#,
        name = escape_html(&user.name),
        email = escape_html(&user.email),
    );
    layout("Your account", Some(user), &main)
}

/// Error page shown for failed page requests.
pub fn render_error_page(message: &str) -> String {
    let main = format!(
        r#"    <div class="error">
      <div class="error__title">
        <h2 class="heading-secondary heading-secondary--error">Uh oh! Something went wrong!</h2>
      </div>
      <div class="error__msg">{}</div>
    </div>"#,
        escape_html(message)
    );
    layout("Something went wrong!", None, &main)
}

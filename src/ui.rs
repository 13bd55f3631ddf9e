use crate::auth::AuthMode;
use crate::models::{ActiveTab, Days, Habit, Project, Task};
use crate::stats::{habit_score, project_progress};
use crate::week::WeekId;
use std::collections::HashMap;

const DAY_LABELS: [&str; 7] = ["Lun", "Mar", "Mié", "Jue", "Vie", "Sáb", "Dom"];

/// What the habit view shows. Carried in the URL and in hidden form fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HabitViewState {
    pub week: WeekId,
}

impl HabitViewState {
    pub fn href(&self) -> String {
        format!("/habits?week={}", self.week)
    }
}

/// What the project view shows: the task being edited inline, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectViewState {
    pub editing: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Error(String),
    Success(String),
}

pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

pub fn render_page(body: &str) -> String {
    PAGE_HTML.replace("{{BODY}}", body)
}

pub fn render_auth(mode: AuthMode, email: &str, notice: Option<&Notice>) -> String {
    let tab = |tab_mode: AuthMode| {
        let class = if tab_mode == mode { "auth-tab active" } else { "auth-tab" };
        format!(
            r#"<a class="{class}" href="/?mode={}">{}</a>"#,
            tab_mode.as_str(),
            tab_mode.submit_label()
        )
    };
    let message = match notice {
        Some(Notice::Error(text)) => format!(r#"<div class="message error">{}</div>"#, escape(text)),
        Some(Notice::Success(text)) => {
            format!(r#"<div class="message success">{}</div>"#, escape(text))
        }
        None => r#"<div class="message"></div>"#.to_string(),
    };

    render_page(&format!(
        r#"<div class="auth-card">
  <h2>CheckApp</h2>
  <p class="subtitle">Gestiona tus hábitos y proyectos</p>
  <nav class="auth-tabs">{login}{register}</nav>
  <form method="post" action="/auth/{action}" data-busy>
    <input type="email" name="email" placeholder="Email" value="{email}" required />
    <input type="password" name="password" placeholder="Contraseña" required minlength="6" />
    {message}
    <button type="submit" class="btn-primary" data-loading="Cargando...">{label}</button>
  </form>
</div>"#,
        login = tab(AuthMode::Login),
        register = tab(AuthMode::Register),
        action = mode.as_str(),
        email = escape(email),
        label = mode.submit_label(),
    ))
}

pub fn render_shell(tab: ActiveTab, user_email: Option<&str>, content: &str) -> String {
    let tab_link = |target: ActiveTab, label: &str| {
        let class = if target == tab { "tab active" } else { "tab" };
        format!(r#"<a class="{class}" href="/{target}">{label}</a>"#)
    };
    let who = user_email
        .map(|email| format!(r#"<span class="who">{}</span>"#, escape(email)))
        .unwrap_or_default();

    render_page(&format!(
        r#"<header>
  <div class="header-top">
    <h1>CheckApp</h1>
    {who}
    <form method="post" action="/auth/logout" data-busy>
      <button type="submit" class="btn-logout">Cerrar Sesión</button>
    </form>
  </div>
  <nav class="tabs">{habits}{projects}</nav>
</header>
<main id="content">{content}</main>"#,
        habits = tab_link(ActiveTab::Habits, "Hábitos"),
        projects = tab_link(ActiveTab::Projects, "Proyectos"),
    ))
}

pub fn render_habits(
    state: &HabitViewState,
    habits: &[Habit],
    logs: &HashMap<String, Days>,
) -> String {
    let week = state.week;
    let body = if habits.is_empty() {
        r#"<p class="empty-state">No tienes hábitos. Agrega uno para empezar.</p>"#.to_string()
    } else {
        let header: String = DAY_LABELS
            .iter()
            .map(|day| format!("<th>{day}</th>"))
            .collect();
        let rows: String = habits
            .iter()
            .map(|habit| {
                let days = logs.get(&habit.id).copied().unwrap_or_default();
                render_habit_row(week, habit, &days)
            })
            .collect();
        format!(
            r#"<table class="habits-table">
  <thead><tr><th>Hábito</th>{header}<th>%</th><th></th></tr></thead>
  <tbody>{rows}</tbody>
</table>"#
        )
    };

    format!(
        r#"<section class="habits-section">
  <h2>Hábitos Semanales</h2>
  <div class="week-nav">
    <a class="btn-icon" href="/habits?week={prev}">&larr;</a>
    <span id="current-week">{label}</span>
    <a class="btn-icon" href="/habits?week={next}">&rarr;</a>
  </div>
  <form class="add-row" method="post" action="/habits" data-busy>
    <input type="hidden" name="week" value="{week}" />
    <input type="text" name="name" placeholder="Nuevo hábito..." autocomplete="off" />
    <button type="submit" class="btn-primary">Agregar</button>
  </form>
  {body}
</section>"#,
        prev = week.previous(),
        next = week.next(),
        label = week.label(),
    )
}

fn render_habit_row(week: WeekId, habit: &Habit, days: &Days) -> String {
    let id = escape(&habit.id);
    let score = habit_score(days);
    let cells: String = days
        .iter()
        .enumerate()
        .map(|(day, checked)| {
            format!(
                r#"<td><form method="post" action="/habits/{id}/days/{day}" data-busy>
  <input type="hidden" name="week" value="{week}" />
  <input type="checkbox" class="day-check" name="value" value="on" onchange="this.form.requestSubmit()" {checked} />
</form></td>"#,
                checked = if checked { "checked" } else { "" },
            )
        })
        .collect();

    format!(
        r#"<tr data-habit-id="{id}">
  <td class="habit-name">{name}</td>
  {cells}
  <td class="percentage {band}">{percentage}%</td>
  <td><form method="post" action="/habits/{id}/delete" data-busy data-confirm="¿Eliminar este hábito?">
    <input type="hidden" name="week" value="{week}" />
    <button type="submit" class="btn-delete" title="Eliminar">&times;</button>
  </form></td>
</tr>"#,
        name = escape(&habit.name),
        band = score.band.css_class(),
        percentage = score.percentage,
    )
}

pub fn render_projects(state: &ProjectViewState, projects: &[Project]) -> String {
    let body = if projects.is_empty() {
        r#"<p class="empty-state">No tienes lista de tareas. Crea una para empezar.</p>"#
            .to_string()
    } else {
        let cards: String = projects
            .iter()
            .enumerate()
            .map(|(index, project)| render_project(state, index, project))
            .collect();
        format!(r#"<div class="projects-list">{cards}</div>"#)
    };

    format!(
        r#"<section class="projects-section">
  <h2>Lista de Tareas</h2>
  <form class="add-row" method="post" action="/projects" data-busy>
    <input type="text" name="name" placeholder="Nueva lista de tareas..." autocomplete="off" />
    <button type="submit" class="btn-primary">Crear</button>
  </form>
  {body}
</section>"#
    )
}

fn render_project(state: &ProjectViewState, index: usize, project: &Project) -> String {
    let id = escape(&project.id);
    let progress = project_progress(&project.tasks);
    let bar = if progress.total > 0 {
        format!(
            r#"<div class="progress-bar"><div class="progress-fill" style="width: {}%"></div></div>"#,
            progress.percentage
        )
    } else {
        String::new()
    };
    let tasks: String = project
        .tasks
        .iter()
        .map(|task| render_task(state, &id, task))
        .collect();

    format!(
        r#"<div class="project-card" data-project-id="{id}" data-index="{index}" draggable="true">
  <div class="project-header">
    <span class="drag-handle" title="Arrastrar para reordenar">&#10303;</span>
    <h3>{name}</h3>
    <span class="project-progress{complete}">{done}/{total} ({percentage}%)</span>
    <form method="post" action="/projects/{id}/delete" data-busy data-confirm="¿Eliminar este proyecto y todas sus tareas?">
      <button type="submit" class="btn-delete" title="Eliminar proyecto">&times;</button>
    </form>
  </div>
  {bar}
  <div class="tasks-list">{tasks}</div>
  <form class="add-row" method="post" action="/projects/{id}/tasks" data-busy>
    <input type="text" name="text" placeholder="Nueva tarea..." autocomplete="off" />
    <button type="submit" class="btn-secondary">+</button>
  </form>
</div>"#,
        name = escape(&project.name),
        complete = if progress.is_complete() { " complete" } else { "" },
        done = progress.done,
        total = progress.total,
        percentage = progress.percentage,
    )
}

fn render_task(state: &ProjectViewState, project_id: &str, task: &Task) -> String {
    let id = escape(&task.id);
    let text = escape(&task.text);
    let editing = state.editing.as_deref() == Some(task.id.as_str());
    let label = if editing {
        format!(
            r#"<form class="edit-task" method="post" action="/projects/{project_id}/tasks/{id}/edit" data-submit-once>
  <input type="hidden" name="original" value="{text}" />
  <input type="text" name="text" value="{text}" autocomplete="off" autofocus onfocus="this.select()" />
</form>"#
        )
    } else {
        format!(r#"<span class="task-text">{text}</span>"#)
    };

    format!(
        r#"<div class="task-swipe-container" data-task-id="{id}">
  <div class="task-item{done}">
    <form method="post" action="/projects/{project_id}/tasks/{id}/toggle" data-busy>
      <input type="checkbox" class="task-check" onchange="this.form.requestSubmit()" {checked} />
    </form>
    {label}
  </div>
  <div class="task-actions">
    <a class="task-action-btn edit-task" href="/projects?edit={id}">Editar</a>
    <form method="post" action="/projects/{project_id}/tasks/{id}/delete" data-busy>
      <button type="submit" class="task-action-btn delete-task">Eliminar</button>
    </form>
  </div>
</div>"#,
        done = if task.done { " done" } else { "" },
        checked = if task.done { "checked" } else { "" },
    )
}

const PAGE_HTML: &str = r#"<!DOCTYPE html>
<html lang="es">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>CheckApp</title>
  <style>
    :root {
      --bg: #f5f3ee;
      --ink: #2b2a28;
      --muted: #6f6a65;
      --accent: #4a6cf7;
      --success: #2d7a4b;
      --danger: #c63b2b;
      --warn: #d08a1c;
      --card: #ffffff;
      --shadow: 0 12px 32px rgba(43, 42, 40, 0.1);
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: var(--bg);
      color: var(--ink);
      font-family: "Trebuchet MS", sans-serif;
      padding: 24px 16px 48px;
    }

    header, main, .auth-card {
      max-width: 860px;
      margin: 0 auto;
    }

    .header-top {
      display: flex;
      align-items: center;
      justify-content: space-between;
      gap: 12px;
    }

    .who {
      color: var(--muted);
      font-size: 0.9rem;
      margin-left: auto;
    }

    .tabs, .auth-tabs {
      display: flex;
      gap: 6px;
      margin: 16px 0;
    }

    .tab, .auth-tab {
      padding: 8px 16px;
      border-radius: 999px;
      color: var(--muted);
      text-decoration: none;
      font-weight: 600;
    }

    .tab.active, .auth-tab.active {
      background: var(--card);
      color: var(--accent);
      box-shadow: var(--shadow);
    }

    .auth-card, .project-card, .habits-table {
      background: var(--card);
      border-radius: 18px;
      box-shadow: var(--shadow);
      padding: 20px;
    }

    .auth-card {
      max-width: 420px;
      margin-top: 10vh;
    }

    .auth-card form {
      display: grid;
      gap: 12px;
    }

    input[type="text"], input[type="email"], input[type="password"] {
      padding: 10px 12px;
      border: 1px solid #ddd;
      border-radius: 10px;
      font-size: 1rem;
      width: 100%;
    }

    button, .btn-icon {
      border: none;
      border-radius: 10px;
      padding: 10px 14px;
      font-weight: 600;
      cursor: pointer;
    }

    button:disabled {
      opacity: 0.6;
      cursor: progress;
    }

    .btn-primary {
      background: var(--accent);
      color: white;
    }

    .btn-secondary {
      background: #e8ebfb;
      color: var(--accent);
    }

    .btn-delete {
      background: transparent;
      color: var(--danger);
      font-size: 1.2rem;
    }

    .btn-logout {
      background: transparent;
      color: var(--muted);
    }

    .btn-icon {
      background: var(--card);
      color: var(--ink);
      text-decoration: none;
    }

    .message.error {
      color: var(--danger);
    }

    .message.success {
      color: var(--success);
    }

    .add-row {
      display: flex;
      gap: 8px;
      margin: 12px 0;
    }

    .week-nav {
      display: flex;
      align-items: center;
      gap: 12px;
    }

    .habits-table {
      width: 100%;
      border-collapse: separate;
    }

    .habits-table td, .habits-table th {
      text-align: center;
      padding: 6px;
    }

    .habits-table form {
      margin: 0;
    }

    .habit-name {
      text-align: left !important;
    }

    .percentage.high { color: var(--success); }
    .percentage.medium { color: var(--warn); }
    .percentage.low { color: var(--danger); }

    .projects-list {
      display: grid;
      gap: 16px;
    }

    .project-card.dragging { opacity: 0.5; }
    .project-card.drag-over { outline: 2px dashed var(--accent); }

    .project-header {
      display: flex;
      align-items: center;
      gap: 10px;
    }

    .project-header h3 {
      margin: 0;
      flex: 1;
    }

    .drag-handle {
      cursor: grab;
      touch-action: none;
    }

    .project-progress.complete {
      color: var(--success);
    }

    .progress-bar {
      height: 6px;
      background: #eee;
      border-radius: 999px;
      margin: 10px 0;
      overflow: hidden;
    }

    .progress-fill {
      height: 100%;
      background: var(--accent);
    }

    .task-swipe-container {
      position: relative;
      overflow: hidden;
    }

    .task-item {
      display: flex;
      align-items: center;
      gap: 8px;
      padding: 8px 0;
      background: var(--card);
      position: relative;
      z-index: 1;
      transition: transform 0.2s;
    }

    .task-item form {
      margin: 0;
    }

    .task-item.done .task-text {
      text-decoration: line-through;
      color: var(--muted);
    }

    .task-swipe-container.swiped .task-item {
      transform: translateX(-140px);
    }

    .task-actions {
      position: absolute;
      top: 0;
      right: 0;
      bottom: 0;
      display: flex;
      align-items: center;
      gap: 6px;
    }

    .task-actions form {
      margin: 0;
    }

    .task-action-btn {
      font-size: 0.85rem;
      padding: 6px 10px;
      border-radius: 8px;
      background: #eee;
      color: var(--ink);
      text-decoration: none;
    }

    .delete-task {
      background: var(--danger);
      color: white;
    }

    .empty-state {
      color: var(--muted);
    }
  </style>
</head>
<body>
{{BODY}}
  <script>
    document.querySelectorAll('form[data-submit-once]').forEach((form) => {
      form.addEventListener('submit', (event) => {
        if (form.dataset.submitted) {
          event.preventDefault();
          return;
        }
        form.dataset.submitted = 'true';
      });
      const field = form.querySelector('input[type="text"]');
      field.addEventListener('blur', () => {
        if (!form.dataset.submitted) {
          form.requestSubmit();
        }
      });
    });

    document.querySelectorAll('form[data-busy]').forEach((form) => {
      form.addEventListener('submit', (event) => {
        if (form.dataset.confirm && !confirm(form.dataset.confirm)) {
          event.preventDefault();
          return;
        }
        const button = form.querySelector('button[type="submit"]');
        if (button) {
          button.disabled = true;
          if (button.dataset.loading) {
            button.textContent = button.dataset.loading;
          }
        }
        form.querySelectorAll('input[type="checkbox"]').forEach((box) => {
          box.style.pointerEvents = 'none';
        });
      });
    });

    const events = new EventSource('/api/session/events');
    events.addEventListener('auth', () => location.replace('/'));

    const postJson = async (url, body) => {
      const res = await fetch(url, {
        method: 'POST',
        headers: { 'content-type': 'application/json' },
        body: JSON.stringify(body)
      });
      if (!res.ok) {
        throw new Error(await res.text());
      }
      return res.json();
    };

    const closeSwipes = (except) => {
      document.querySelectorAll('.task-swipe-container.swiped').forEach((other) => {
        if (other !== except) {
          other.classList.remove('swiped');
          other.querySelector('.task-item').style.transform = '';
        }
      });
    };

    document.querySelectorAll('.task-swipe-container').forEach((container) => {
      const item = container.querySelector('.task-item');
      let startX = null;
      let currentX = null;

      container.addEventListener('touchstart', (event) => {
        if (event.target.classList.contains('task-check')) return;
        startX = event.touches[0].clientX;
        currentX = startX;
        item.style.transition = 'none';
      }, { passive: true });

      container.addEventListener('touchmove', (event) => {
        if (startX === null) return;
        currentX = event.touches[0].clientX;
        const diff = Math.min(0, Math.max(currentX - startX, -140));
        item.style.transform = `translateX(${diff}px)`;
      }, { passive: true });

      container.addEventListener('touchend', () => {
        if (startX === null) return;
        item.style.transition = 'transform 0.2s';
        item.style.transform = '';
        postJson('/api/gestures/swipe', { start_x: startX, end_x: currentX })
          .then((res) => {
            if (res.intent === 'reveal') {
              container.classList.add('swiped');
              closeSwipes(container);
            } else {
              container.classList.remove('swiped');
            }
          })
          .catch(() => container.classList.remove('swiped'));
        startX = null;
      });
    });

    document.addEventListener('click', (event) => {
      if (!event.target.closest('.task-swipe-container')) {
        closeSwipes(null);
      }
    });

    const cards = Array.from(document.querySelectorAll('.project-card'));
    let dragged = null;

    const reorder = (from, to) => {
      const body = new URLSearchParams({ from, to });
      return fetch('/projects/reorder', { method: 'POST', body }).then(() => location.reload());
    };

    cards.forEach((card) => {
      card.addEventListener('dragstart', (event) => {
        dragged = card;
        card.classList.add('dragging');
        event.dataTransfer.effectAllowed = 'move';
      });
      card.addEventListener('dragend', () => {
        card.classList.remove('dragging');
        dragged = null;
        cards.forEach((c) => c.classList.remove('drag-over'));
      });
      card.addEventListener('dragover', (event) => {
        event.preventDefault();
        if (dragged && dragged !== card) card.classList.add('drag-over');
      });
      card.addEventListener('dragleave', () => card.classList.remove('drag-over'));
      card.addEventListener('drop', (event) => {
        event.preventDefault();
        if (dragged && dragged !== card) {
          reorder(dragged.dataset.index, card.dataset.index);
        }
      });

      const handle = card.querySelector('.drag-handle');
      let touching = false;
      handle.addEventListener('touchstart', (event) => {
        touching = true;
        card.classList.add('dragging');
        event.preventDefault();
      }, { passive: false });
      handle.addEventListener('touchmove', (event) => {
        if (!touching) return;
        event.preventDefault();
        const y = event.touches[0].clientY;
        cards.forEach((c) => {
          const rect = c.getBoundingClientRect();
          c.classList.toggle('drag-over', c !== card && y >= rect.top && y <= rect.bottom);
        });
      }, { passive: false });
      handle.addEventListener('touchend', (event) => {
        if (!touching) return;
        touching = false;
        card.classList.remove('dragging');
        cards.forEach((c) => c.classList.remove('drag-over'));
        const bounds = cards.map((c) => {
          const rect = c.getBoundingClientRect();
          return { top: rect.top, bottom: rect.bottom };
        });
        postJson('/api/gestures/drop', {
          from: Number(card.dataset.index),
          release_y: event.changedTouches[0].clientY,
          cards: bounds
        }).then((res) => {
          if (res.outcome === 'reorder') location.reload();
        });
      });
    });
  </script>
</body>
</html>
"#;

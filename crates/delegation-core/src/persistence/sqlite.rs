use super::TaskStore;
use crate::error::{ConfigError, StoreError, StoreResult};
use crate::exceptions::TaskException;
use crate::student::{Staff, Student, StudentId};
use crate::task::{TaskId, TaskInstance, TaskOwner};
use crate::template::{TemplateId, TemplateRecord};
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::warn;

const DATE_FORMAT: &str = "%Y-%m-%d";

const TASK_COLUMNS: &str = "id, description, category, staff_id, student_id, deadline, \
     completed, completed_at, completion_note, template_id";

const TEMPLATE_COLUMNS: &str = "id, description, category, frequency, staff_id, student_id, \
     active, created_on, last_generated";

/// SQLite-backed store. The tasks table carries `UNIQUE(template_id,
/// deadline)`, so concurrent generators cannot both commit the same pair.
pub struct SqliteTaskStore {
    connection: Mutex<Connection>,
}

impl SqliteTaskStore {
    pub fn new<P: AsRef<std::path::Path>>(path: P) -> StoreResult<Self> {
        let connection = Connection::open(path)?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    pub fn in_memory() -> StoreResult<Self> {
        let connection = Connection::open_in_memory()?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn initialize_schema(connection: &Connection) -> StoreResult<()> {
        let ddl = r#"
            CREATE TABLE IF NOT EXISTS templates (
                id INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                category TEXT NOT NULL,
                frequency TEXT NOT NULL,
                staff_id INTEGER NOT NULL,
                student_id INTEGER,
                active INTEGER NOT NULL DEFAULT 1,
                created_on TEXT NOT NULL,
                last_generated TEXT
            );
            CREATE TABLE IF NOT EXISTS students (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                goals_json TEXT NOT NULL,
                needs_json TEXT NOT NULL,
                ard_date TEXT
            );
            CREATE TABLE IF NOT EXISTS staff (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                expertise_json TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                description TEXT NOT NULL,
                category TEXT NOT NULL,
                staff_id INTEGER,
                student_id INTEGER,
                deadline TEXT NOT NULL,
                completed INTEGER NOT NULL DEFAULT 0,
                completed_at TEXT,
                completion_note TEXT,
                template_id INTEGER,
                UNIQUE (template_id, deadline)
            );
            CREATE TABLE IF NOT EXISTS exceptions (
                template_id INTEGER NOT NULL,
                date TEXT NOT NULL,
                reason TEXT NOT NULL,
                staff_id INTEGER NOT NULL,
                PRIMARY KEY (template_id, date)
            );
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }

    fn query_tasks<P: rusqlite::Params>(
        &self,
        filter: &str,
        params: P,
    ) -> StoreResult<Vec<TaskInstance>> {
        let conn = self.connection.lock();
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks {filter} ORDER BY id ASC");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params, TaskRow::from_row)?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?.into_task()?);
        }
        Ok(tasks)
    }

    fn update_task<F>(&self, id: TaskId, change: F) -> StoreResult<()>
    where
        F: FnOnce(&mut TaskInstance),
    {
        let mut task = self.find_task(id)?.ok_or(StoreError::TaskNotFound(id))?;
        change(&mut task);
        let conn = self.connection.lock();
        conn.execute(
            "UPDATE tasks SET completed = ?1, completed_at = ?2, completion_note = ?3 \
             WHERE id = ?4",
            params![
                task.completed,
                task.completed_at.map(|at| at.to_rfc3339()),
                task.completion_note,
                id
            ],
        )?;
        Ok(())
    }
}

impl TaskStore for SqliteTaskStore {
    fn list_active_templates(&self) -> StoreResult<Vec<TemplateRecord>> {
        Ok(self.scan_active_templates()?.0)
    }

    /// Rows whose dates do not parse come back as `ConfigError`s instead of
    /// failing the listing.
    fn scan_active_templates(&self) -> StoreResult<(Vec<TemplateRecord>, Vec<ConfigError>)> {
        let conn = self.connection.lock();
        let sql =
            format!("SELECT {TEMPLATE_COLUMNS} FROM templates WHERE active = 1 ORDER BY id ASC");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], TemplateRow::from_row)?;
        let mut templates = Vec::new();
        let mut rejected = Vec::new();
        for row in rows {
            let row = row?;
            let id = row.id;
            match row.into_record() {
                Ok(record) => templates.push(record),
                Err(err) => {
                    warn!(template_id = id, error = %err, "unreadable template row");
                    rejected.push(ConfigError::template(id, err.to_string()));
                }
            }
        }
        Ok((templates, rejected))
    }

    fn find_template(&self, id: TemplateId) -> StoreResult<Option<TemplateRecord>> {
        let conn = self.connection.lock();
        let sql = format!("SELECT {TEMPLATE_COLUMNS} FROM templates WHERE id = ?1");
        let row = conn
            .query_row(&sql, params![id], TemplateRow::from_row)
            .optional()?;
        row.map(TemplateRow::into_record).transpose()
    }

    fn save_template(&self, template: &TemplateRecord) -> StoreResult<()> {
        let conn = self.connection.lock();
        conn.execute(
            "INSERT OR REPLACE INTO templates \
             (id, description, category, frequency, staff_id, student_id, active, \
              created_on, last_generated) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                template.id,
                template.description,
                template.category,
                template.frequency,
                template.staff_id,
                template.student_id,
                template.active,
                format_date(template.created_on),
                template.last_generated.map(format_date),
            ],
        )?;
        Ok(())
    }

    fn set_last_generated(&self, id: TemplateId, date: NaiveDate) -> StoreResult<()> {
        let conn = self.connection.lock();
        let changed = conn.execute(
            "UPDATE templates SET last_generated = ?1 WHERE id = ?2",
            params![format_date(date), id],
        )?;
        if changed == 0 {
            return Err(StoreError::TemplateNotFound(id));
        }
        Ok(())
    }

    fn list_students(&self) -> StoreResult<Vec<Student>> {
        let conn = self.connection.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, goals_json, needs_json, ard_date FROM students ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], StudentRow::from_row)?;
        let mut students = Vec::new();
        for row in rows {
            students.push(row?.into_student()?);
        }
        Ok(students)
    }

    fn find_student(&self, id: StudentId) -> StoreResult<Option<Student>> {
        let conn = self.connection.lock();
        let row = conn
            .query_row(
                "SELECT id, name, goals_json, needs_json, ard_date FROM students WHERE id = ?1",
                params![id],
                StudentRow::from_row,
            )
            .optional()?;
        row.map(StudentRow::into_student).transpose()
    }

    fn save_student(&self, student: &Student) -> StoreResult<()> {
        let goals = serde_json::to_string(&student.goals)?;
        let needs = serde_json::to_string(&student.needs)?;
        let conn = self.connection.lock();
        conn.execute(
            "INSERT OR REPLACE INTO students (id, name, goals_json, needs_json, ard_date) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                student.id,
                student.name,
                goals,
                needs,
                student.ard_date.map(format_date)
            ],
        )?;
        Ok(())
    }

    fn list_staff(&self) -> StoreResult<Vec<Staff>> {
        let conn = self.connection.lock();
        let mut stmt = conn.prepare("SELECT id, name, expertise_json FROM staff ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i32>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut staff = Vec::new();
        for row in rows {
            let (id, name, expertise_json) = row?;
            let expertise: Vec<String> = serde_json::from_str(&expertise_json)?;
            staff.push(Staff {
                id,
                name,
                expertise,
            });
        }
        Ok(staff)
    }

    fn save_staff(&self, staff: &Staff) -> StoreResult<()> {
        let expertise = serde_json::to_string(&staff.expertise)?;
        let conn = self.connection.lock();
        conn.execute(
            "INSERT OR REPLACE INTO staff (id, name, expertise_json) VALUES (?1, ?2, ?3)",
            params![staff.id, staff.name, expertise],
        )?;
        Ok(())
    }

    fn list_open_tasks(&self, owner: TaskOwner) -> StoreResult<Vec<TaskInstance>> {
        match owner {
            TaskOwner::Student(id) => {
                self.query_tasks("WHERE completed = 0 AND student_id = ?1", params![id])
            }
            TaskOwner::Staff(id) => {
                self.query_tasks("WHERE completed = 0 AND staff_id = ?1", params![id])
            }
            TaskOwner::All => self.query_tasks("WHERE completed = 0", params![]),
        }
    }

    fn list_tasks_on(&self, date: NaiveDate) -> StoreResult<Vec<TaskInstance>> {
        self.query_tasks("WHERE deadline = ?1", params![format_date(date)])
    }

    fn list_tasks_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<TaskInstance>> {
        self.query_tasks(
            "WHERE deadline BETWEEN ?1 AND ?2",
            params![format_date(start), format_date(end)],
        )
    }

    fn find_task(&self, id: TaskId) -> StoreResult<Option<TaskInstance>> {
        Ok(self
            .query_tasks("WHERE id = ?1", params![id])?
            .into_iter()
            .next())
    }

    fn create_task(&self, task: &TaskInstance) -> StoreResult<TaskId> {
        let conn = self.connection.lock();
        let result = conn.execute(
            "INSERT INTO tasks \
             (description, category, staff_id, student_id, deadline, completed, completed_at, \
              completion_note, template_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                task.description,
                task.category,
                task.staff_id,
                task.student_id,
                format_date(task.deadline),
                task.completed,
                task.completed_at.map(|at| at.to_rfc3339()),
                task.completion_note,
                task.template_id,
            ],
        );
        match result {
            Ok(_) => Ok(conn.last_insert_rowid() as TaskId),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                match task.template_id {
                    Some(template_id) => Err(StoreError::Duplicate {
                        template_id,
                        date: task.deadline,
                    }),
                    None => Err(StoreError::InvalidData(err.to_string())),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    fn mark_completed(
        &self,
        id: TaskId,
        note: Option<&str>,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.update_task(id, |task| task.complete(note, at))
    }

    fn mark_incomplete(&self, id: TaskId) -> StoreResult<()> {
        self.update_task(id, TaskInstance::reopen)
    }

    fn add_task_note(&self, id: TaskId, note: &str, append: bool) -> StoreResult<()> {
        self.update_task(id, |task| task.add_note(note, append))
    }

    fn list_exceptions(&self) -> StoreResult<Vec<TaskException>> {
        let conn = self.connection.lock();
        let mut stmt = conn.prepare(
            "SELECT template_id, date, reason, staff_id FROM exceptions ORDER BY template_id, date",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, TemplateId>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i32>(3)?,
            ))
        })?;
        let mut exceptions = Vec::new();
        for row in rows {
            let (template_id, date, reason, staff_id) = row?;
            exceptions.push(TaskException::new(
                template_id,
                parse_date(&date)?,
                reason,
                staff_id,
            ));
        }
        Ok(exceptions)
    }

    fn record_exception(&self, exception: &TaskException) -> StoreResult<bool> {
        let conn = self.connection.lock();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO exceptions (template_id, date, reason, staff_id) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                exception.template_id,
                format_date(exception.date),
                exception.reason,
                exception.staff_id
            ],
        )?;
        Ok(inserted == 1)
    }
}

struct TaskRow {
    id: TaskId,
    description: String,
    category: String,
    staff_id: Option<i32>,
    student_id: Option<i32>,
    deadline: String,
    completed: bool,
    completed_at: Option<String>,
    completion_note: Option<String>,
    template_id: Option<TemplateId>,
}

impl TaskRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            description: row.get(1)?,
            category: row.get(2)?,
            staff_id: row.get(3)?,
            student_id: row.get(4)?,
            deadline: row.get(5)?,
            completed: row.get(6)?,
            completed_at: row.get(7)?,
            completion_note: row.get(8)?,
            template_id: row.get(9)?,
        })
    }

    fn into_task(self) -> StoreResult<TaskInstance> {
        let completed_at = match self.completed_at {
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(&raw)
                    .map_err(|e| {
                        StoreError::InvalidData(format!("invalid timestamp '{raw}': {e}"))
                    })?
                    .with_timezone(&Utc),
            ),
            None => None,
        };
        Ok(TaskInstance {
            id: Some(self.id),
            description: self.description,
            category: self.category,
            staff_id: self.staff_id,
            student_id: self.student_id,
            deadline: parse_date(&self.deadline)?,
            completed: self.completed,
            completed_at,
            completion_note: self.completion_note,
            template_id: self.template_id,
        })
    }
}

struct TemplateRow {
    id: TemplateId,
    description: String,
    category: String,
    frequency: String,
    staff_id: i32,
    student_id: Option<i32>,
    active: bool,
    created_on: String,
    last_generated: Option<String>,
}

impl TemplateRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            description: row.get(1)?,
            category: row.get(2)?,
            frequency: row.get(3)?,
            staff_id: row.get(4)?,
            student_id: row.get(5)?,
            active: row.get(6)?,
            created_on: row.get(7)?,
            last_generated: row.get(8)?,
        })
    }

    /// Frequency stays raw text; validation happens in the engine so one bad
    /// row does not fail the listing.
    fn into_record(self) -> StoreResult<TemplateRecord> {
        Ok(TemplateRecord {
            id: self.id,
            description: self.description,
            category: self.category,
            frequency: self.frequency,
            staff_id: self.staff_id,
            student_id: self.student_id,
            active: self.active,
            created_on: parse_date(&self.created_on)?,
            last_generated: self.last_generated.as_deref().map(parse_date).transpose()?,
        })
    }
}

struct StudentRow {
    id: StudentId,
    name: String,
    goals_json: String,
    needs_json: String,
    ard_date: Option<String>,
}

impl StudentRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            goals_json: row.get(2)?,
            needs_json: row.get(3)?,
            ard_date: row.get(4)?,
        })
    }

    fn into_student(self) -> StoreResult<Student> {
        Ok(Student {
            id: self.id,
            name: self.name,
            goals: serde_json::from_str(&self.goals_json)?,
            needs: serde_json::from_str(&self.needs_json)?,
            ard_date: self.ard_date.as_deref().map(parse_date).transpose()?,
        })
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(input: &str) -> StoreResult<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT)
        .map_err(|e| StoreError::InvalidData(format!("invalid date '{input}': {e}")))
}

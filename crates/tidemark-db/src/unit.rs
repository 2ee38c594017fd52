use rusqlite::Connection;
use tidemark_common::{Direction, Error, Result, Version};

/// A single schema change. Both operations receive the live connection as
/// their only dependency and must block until their work is done.
pub trait Migration {
    fn up(&self, conn: &Connection) -> Result<()>;
    fn down(&self, conn: &Connection) -> Result<()>;
}

/// A migration written as a plain SQL file:
///
/// ```sql
/// -- up
/// CREATE TABLE users (id INTEGER PRIMARY KEY);
///
/// -- down
/// DROP TABLE users;
/// ```
///
/// Lines before the first marker are ignored. A file without a `-- down`
/// section is irreversible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlMigration {
    version: Version,
    up: String,
    down: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Up,
    Down,
}

impl SqlMigration {
    /// Split `content` into its up and down sections. The error string says
    /// why the file does not define exactly one migration.
    pub fn parse(version: Version, content: &str) -> std::result::Result<Self, String> {
        let mut up: Option<Vec<&str>> = None;
        let mut down: Option<Vec<&str>> = None;
        let mut section = Section::Preamble;

        for line in content.lines() {
            match marker(line) {
                Some(Section::Up) => {
                    if up.is_some() {
                        return Err("more than one `-- up` section".into());
                    }
                    up = Some(Vec::new());
                    section = Section::Up;
                }
                Some(Section::Down) => {
                    if down.is_some() {
                        return Err("more than one `-- down` section".into());
                    }
                    down = Some(Vec::new());
                    section = Section::Down;
                }
                _ => match section {
                    Section::Up => up.get_or_insert_with(Vec::new).push(line),
                    Section::Down => down.get_or_insert_with(Vec::new).push(line),
                    Section::Preamble => {}
                },
            }
        }

        let up = up.ok_or_else(|| "no `-- up` section found".to_string())?;
        Ok(Self {
            version,
            up: up.join("\n").trim().to_string(),
            down: down.map(|lines| lines.join("\n").trim().to_string()),
        })
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn up_sql(&self) -> &str {
        &self.up
    }

    pub fn down_sql(&self) -> Option<&str> {
        self.down.as_deref()
    }

    fn run(&self, conn: &Connection, sql: &str, direction: Direction) -> Result<()> {
        conn.execute_batch(sql)
            .map_err(|e| Error::UnitExecution {
                version: self.version,
                direction,
                message: e.to_string(),
            })
    }
}

impl Migration for SqlMigration {
    fn up(&self, conn: &Connection) -> Result<()> {
        self.run(conn, &self.up, Direction::Up)
    }

    fn down(&self, conn: &Connection) -> Result<()> {
        match &self.down {
            Some(sql) => self.run(conn, sql, Direction::Down),
            None => Err(Error::UnitExecution {
                version: self.version,
                direction: Direction::Down,
                message: "migration is irreversible: no `-- down` section".into(),
            }),
        }
    }
}

fn marker(line: &str) -> Option<Section> {
    let rest = line.trim().strip_prefix("--")?;
    match rest.trim().to_lowercase().as_str() {
        "up" | "up migration" => Some(Section::Up),
        "down" | "down migration" => Some(Section::Down),
        _ => None,
    }
}

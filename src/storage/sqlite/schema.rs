//! Schema for the school records database.
//!
//! Table and column names follow the existing school database so the store
//! can open files created by the legacy application.

use super::connection::map_sqlite_error;
use crate::Result;
use rusqlite::Connection;

const TABLES: &str = "
    CREATE TABLE IF NOT EXISTS alunos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        nome TEXT NOT NULL,
        email TEXT UNIQUE,
        cpf TEXT UNIQUE,
        data_nascimento TEXT,
        status TEXT DEFAULT 'ativo',
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    );
    CREATE TABLE IF NOT EXISTS professores (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        nome TEXT NOT NULL,
        email TEXT UNIQUE,
        cpf TEXT UNIQUE,
        especializacao TEXT,
        status TEXT DEFAULT 'ativo',
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    );
    CREATE TABLE IF NOT EXISTS turmas (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        nome TEXT NOT NULL,
        ano TEXT,
        turno TEXT,
        professor_id INTEGER,
        status TEXT DEFAULT 'ativa',
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    );
    CREATE TABLE IF NOT EXISTS matriculas (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        aluno_id INTEGER NOT NULL,
        turma_id INTEGER NOT NULL,
        data_matricula TEXT DEFAULT CURRENT_TIMESTAMP,
        status TEXT DEFAULT 'ativa'
    );
    CREATE TABLE IF NOT EXISTS notas (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        matricula_id INTEGER NOT NULL,
        disciplina TEXT NOT NULL,
        nota REAL NOT NULL,
        bimestre INTEGER NOT NULL,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    );
    CREATE TABLE IF NOT EXISTS frequencia (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        matricula_id INTEGER NOT NULL,
        data TEXT NOT NULL,
        presente INTEGER DEFAULT 1,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    );
";

const INDEXES: &str = "
    CREATE UNIQUE INDEX IF NOT EXISTS idx_notas_unique
        ON notas(matricula_id, disciplina, bimestre);
    CREATE INDEX IF NOT EXISTS idx_matriculas_turma ON matriculas(turma_id);
    CREATE INDEX IF NOT EXISTS idx_matriculas_aluno ON matriculas(aluno_id);
    CREATE INDEX IF NOT EXISTS idx_frequencia_matricula_data ON frequencia(matricula_id, data);
";

/// Creates the tables and indexes if they do not exist.
///
/// The unique grade index cannot be created over a database that already
/// holds duplicate grades; that failure is returned rather than ignored.
///
/// # Errors
///
/// Returns an error if a statement fails.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(TABLES)
        .map_err(|e| map_sqlite_error("create_tables", &e))?;
    conn.execute_batch(INDEXES)
        .map_err(|e| map_sqlite_error("create_indexes", &e))
}

//! Domain tables (audio/image/video/playlist) layered on top of
//! `scand_common::db`'s generic `files` table and migration framework.
//!
//! Every domain row is keyed 1:1 by `files.id`; `AFTER DELETE` triggers on
//! `files` remove the matching domain row (and vice versa via a trigger on
//! each domain table), so deleting either side never leaves an orphan.

use crate::error::{Result, ScanError};
use scand_common::db::{path_to_bytes, FileRow, TableMigration};
use sqlx::{Row, SqlitePool};
use std::path::Path;

/// All table migrations this crate owns, run once at worker startup.
pub const MIGRATIONS: &[TableMigration] = &[
    TableMigration {
        table: "files",
        steps: &[r#"
            CREATE TABLE files (
                id INTEGER PRIMARY KEY,
                path BLOB UNIQUE NOT NULL,
                size INTEGER NOT NULL DEFAULT 0,
                mtime INTEGER NOT NULL DEFAULT 0,
                dtime INTEGER NOT NULL DEFAULT 0,
                itime INTEGER NOT NULL DEFAULT 0,
                update_id INTEGER NOT NULL DEFAULT 0
            )
        "#],
    },
    TableMigration {
        table: "audio",
        steps: &[r#"
            CREATE TABLE audio_artists (id INTEGER PRIMARY KEY, name TEXT UNIQUE NOT NULL);
            CREATE TABLE audio_albums (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                artist_id INTEGER REFERENCES audio_artists(id),
                UNIQUE(name, artist_id)
            );
            CREATE TABLE audio_genres (id INTEGER PRIMARY KEY, name TEXT UNIQUE NOT NULL);
            CREATE TABLE audios (
                id INTEGER PRIMARY KEY REFERENCES files(id),
                title TEXT,
                album_id INTEGER REFERENCES audio_albums(id),
                artist_id INTEGER REFERENCES audio_artists(id),
                genre_id INTEGER REFERENCES audio_genres(id),
                trackno INTEGER,
                rating INTEGER,
                playcnt INTEGER,
                length INTEGER,
                container TEXT,
                codec TEXT,
                channels INTEGER,
                sampling_rate INTEGER,
                bitrate INTEGER,
                dlna_profile TEXT,
                dlna_mime TEXT
            );
            CREATE TRIGGER audios_delete_cascades_to_files
                AFTER DELETE ON audios
                BEGIN DELETE FROM files WHERE id = old.id; END;
            CREATE TRIGGER files_delete_cascades_to_audios
                AFTER DELETE ON files
                BEGIN DELETE FROM audios WHERE id = old.id; END;
        "#],
    },
    TableMigration {
        table: "image",
        steps: &[r#"
            CREATE TABLE images (
                id INTEGER PRIMARY KEY REFERENCES files(id),
                title TEXT,
                artist TEXT,
                date INTEGER,
                width INTEGER,
                height INTEGER,
                orientation INTEGER,
                gps_lat REAL,
                gps_long REAL,
                gps_alt REAL,
                container TEXT,
                dlna_profile TEXT,
                dlna_mime TEXT
            );
            CREATE TRIGGER images_delete_cascades_to_files
                AFTER DELETE ON images
                BEGIN DELETE FROM files WHERE id = old.id; END;
            CREATE TRIGGER files_delete_cascades_to_images
                AFTER DELETE ON files
                BEGIN DELETE FROM images WHERE id = old.id; END;
        "#],
    },
    TableMigration {
        table: "video",
        steps: &[r#"
            CREATE TABLE videos (
                id INTEGER PRIMARY KEY REFERENCES files(id),
                title TEXT,
                artist TEXT,
                length INTEGER,
                container TEXT,
                dlna_profile TEXT,
                dlna_mime TEXT,
                packet_size INTEGER
            );
            CREATE TABLE videos_videos (
                id INTEGER PRIMARY KEY,
                video_id INTEGER REFERENCES videos(id),
                stream_index INTEGER,
                codec TEXT,
                width INTEGER,
                height INTEGER,
                framerate REAL,
                bitrate INTEGER
            );
            CREATE TABLE videos_audios (
                id INTEGER PRIMARY KEY,
                video_id INTEGER REFERENCES videos(id),
                stream_index INTEGER,
                codec TEXT,
                channels INTEGER,
                sampling_rate INTEGER,
                bitrate INTEGER,
                lang TEXT
            );
            CREATE TABLE videos_subtitles (
                id INTEGER PRIMARY KEY,
                video_id INTEGER REFERENCES videos(id),
                stream_index INTEGER,
                lang TEXT
            );
            CREATE TRIGGER videos_delete_cascades_to_files
                AFTER DELETE ON videos
                BEGIN DELETE FROM files WHERE id = old.id; END;
            CREATE TRIGGER files_delete_cascades_to_videos
                AFTER DELETE ON files
                BEGIN DELETE FROM videos WHERE id = old.id; END;
            CREATE TRIGGER videos_delete_cascades_to_streams
                AFTER DELETE ON videos
                BEGIN
                    DELETE FROM videos_videos WHERE video_id = old.id;
                    DELETE FROM videos_audios WHERE video_id = old.id;
                    DELETE FROM videos_subtitles WHERE video_id = old.id;
                END;
        "#],
    },
    TableMigration {
        table: "playlist",
        steps: &[r#"
            CREATE TABLE playlists (
                id INTEGER PRIMARY KEY REFERENCES files(id),
                title TEXT,
                n_entries INTEGER
            );
            CREATE TRIGGER playlists_delete_cascades_to_files
                AFTER DELETE ON playlists
                BEGIN DELETE FROM files WHERE id = old.id; END;
            CREATE TRIGGER files_delete_cascades_to_playlists
                AFTER DELETE ON files
                BEGIN DELETE FROM playlists WHERE id = old.id; END;
        "#],
    },
];

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    scand_common::db::run_migrations(pool, MIGRATIONS)
        .await
        .map_err(|e| ScanError::SchemaError(e.to_string()))
}

/// Look up the `files` row for `path`, if one has ever been recorded.
pub async fn lookup_file(pool: &SqlitePool, path: &Path) -> Result<Option<FileRow>> {
    let bytes = path_to_bytes(path);
    let row = sqlx::query_as::<_, FileRow>("SELECT * FROM files WHERE path = ?")
        .bind(bytes)
        .fetch_optional(pool)
        .await
        .map_err(|e| ScanError::Common(e.into()))?;
    Ok(row)
}

/// Insert a new `files` row (status: new). Returns the new row id.
pub async fn insert_file(
    pool: &SqlitePool,
    path: &Path,
    size: i64,
    mtime: i64,
    update_id: i64,
) -> Result<i64> {
    let bytes = path_to_bytes(path);
    let id = sqlx::query(
        "INSERT INTO files (path, size, mtime, dtime, itime, update_id) VALUES (?, ?, ?, 0, ?, ?)",
    )
    .bind(bytes)
    .bind(size)
    .bind(mtime)
    .bind(mtime)
    .bind(update_id)
    .execute(pool)
    .await
    .map_err(|e| ScanError::Common(e.into()))?
    .last_insert_rowid();
    Ok(id)
}

/// Mark an existing file outdated/revived row as present again, refreshing
/// `size`/`mtime`/`update_id` and clearing `dtime`.
pub async fn touch_file(
    pool: &SqlitePool,
    id: i64,
    size: i64,
    mtime: i64,
    update_id: i64,
) -> Result<()> {
    sqlx::query("UPDATE files SET size = ?, mtime = ?, dtime = 0, update_id = ? WHERE id = ?")
        .bind(size)
        .bind(mtime)
        .bind(update_id)
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| ScanError::Common(e.into()))?;
    Ok(())
}

/// Refresh only `update_id` for a file confirmed up to date (no metadata change).
pub async fn mark_up_to_date(pool: &SqlitePool, id: i64, update_id: i64) -> Result<()> {
    sqlx::query("UPDATE files SET update_id = ? WHERE id = ?")
        .bind(update_id)
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| ScanError::Common(e.into()))?;
    Ok(())
}

/// Tombstone a file that is no longer present on disk.
pub async fn mark_deleted(pool: &SqlitePool, id: i64, dtime: i64) -> Result<()> {
    sqlx::query("UPDATE files SET dtime = ? WHERE id = ?")
        .bind(dtime)
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| ScanError::Common(e.into()))?;
    Ok(())
}

/// Delete a file row (and, via triggers, its domain row) outright — used
/// when a parse fails, per the `ParseError` contract.
pub async fn delete_file(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM files WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| ScanError::Common(e.into()))?;
    Ok(())
}

/// Permanently purge tombstones (`dtime > 0`) older than `cutoff` (unix
/// seconds). Called by the daemon's post-scan maintenance.
pub async fn purge_tombstones_older_than(pool: &SqlitePool, cutoff: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM files WHERE dtime > 0 AND dtime < ?")
        .bind(cutoff)
        .execute(pool)
        .await
        .map_err(|e| ScanError::Common(e.into()))?;
    Ok(result.rows_affected())
}

/// Files whose path starts with `prefix` (bytewise, case-sensitive LIKE).
pub async fn select_files_under(pool: &SqlitePool, prefix: &Path) -> Result<Vec<FileRow>> {
    let bytes = path_to_bytes(prefix);
    let rows = sqlx::query_as::<_, FileRow>("SELECT * FROM files WHERE path LIKE ?1 || '%'")
        .bind(bytes)
        .fetch_all(pool)
        .await
        .map_err(|e| ScanError::Common(e.into()))?;
    Ok(rows)
}

/// Metadata extracted for an audio file, ready to persist.
#[derive(Debug, Clone, Default)]
pub struct AudioMeta {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub trackno: Option<i64>,
    pub length: Option<i64>,
    pub container: Option<String>,
    pub codec: Option<String>,
    pub channels: Option<i64>,
    pub sampling_rate: Option<i64>,
    pub bitrate: Option<i64>,
    pub dlna_profile: Option<String>,
    pub dlna_mime: Option<String>,
}

async fn get_or_create_artist(pool: &SqlitePool, name: &str) -> Result<i64> {
    get_or_create_named(pool, "audio_artists", name).await
}

async fn get_or_create_genre(pool: &SqlitePool, name: &str) -> Result<i64> {
    get_or_create_named(pool, "audio_genres", name).await
}

async fn get_or_create_named(pool: &SqlitePool, table: &str, name: &str) -> Result<i64> {
    let existing: Option<i64> =
        sqlx::query_scalar(&format!("SELECT id FROM {table} WHERE name = ?"))
            .bind(name)
            .fetch_optional(pool)
            .await
            .map_err(|e| ScanError::Common(e.into()))?;
    if let Some(id) = existing {
        return Ok(id);
    }
    let id = sqlx::query(&format!("INSERT INTO {table} (name) VALUES (?)"))
        .bind(name)
        .execute(pool)
        .await
        .map_err(|e| ScanError::Common(e.into()))?
        .last_insert_rowid();
    Ok(id)
}

async fn get_or_create_album(pool: &SqlitePool, name: &str, artist_id: Option<i64>) -> Result<i64> {
    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM audio_albums WHERE name = ? AND artist_id IS ?")
            .bind(name)
            .bind(artist_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| ScanError::Common(e.into()))?;
    if let Some(id) = existing {
        return Ok(id);
    }
    let id = sqlx::query("INSERT INTO audio_albums (name, artist_id) VALUES (?, ?)")
        .bind(name)
        .bind(artist_id)
        .execute(pool)
        .await
        .map_err(|e| ScanError::Common(e.into()))?
        .last_insert_rowid();
    Ok(id)
}

/// Insert or replace the `audios` row for `file_id`, de-duplicating
/// artist/album/genre into their own tables.
pub async fn upsert_audio(pool: &SqlitePool, file_id: i64, meta: &AudioMeta) -> Result<()> {
    let artist_id = match &meta.artist {
        Some(name) if !name.is_empty() => Some(get_or_create_artist(pool, name).await?),
        _ => None,
    };
    let album_id = match &meta.album {
        Some(name) if !name.is_empty() => Some(get_or_create_album(pool, name, artist_id).await?),
        _ => None,
    };
    let genre_id = match &meta.genre {
        Some(name) if !name.is_empty() => Some(get_or_create_genre(pool, name).await?),
        _ => None,
    };

    sqlx::query(
        r#"
        INSERT INTO audios (
            id, title, album_id, artist_id, genre_id, trackno, rating, playcnt,
            length, container, codec, channels, sampling_rate, bitrate,
            dlna_profile, dlna_mime
        ) VALUES (?, ?, ?, ?, ?, ?, 0, 0, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            album_id = excluded.album_id,
            artist_id = excluded.artist_id,
            genre_id = excluded.genre_id,
            trackno = excluded.trackno,
            length = excluded.length,
            container = excluded.container,
            codec = excluded.codec,
            channels = excluded.channels,
            sampling_rate = excluded.sampling_rate,
            bitrate = excluded.bitrate,
            dlna_profile = excluded.dlna_profile,
            dlna_mime = excluded.dlna_mime
        "#,
    )
    .bind(file_id)
    .bind(&meta.title)
    .bind(album_id)
    .bind(artist_id)
    .bind(genre_id)
    .bind(meta.trackno)
    .bind(meta.length)
    .bind(&meta.container)
    .bind(&meta.codec)
    .bind(meta.channels)
    .bind(meta.sampling_rate)
    .bind(meta.bitrate)
    .bind(&meta.dlna_profile)
    .bind(&meta.dlna_mime)
    .execute(pool)
    .await
    .map_err(|e| ScanError::Common(e.into()))?;
    Ok(())
}

/// Metadata extracted for a still image.
#[derive(Debug, Clone, Default)]
pub struct ImageMeta {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub date: Option<i64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub orientation: Option<i64>,
    pub gps_lat: Option<f64>,
    pub gps_long: Option<f64>,
    pub gps_alt: Option<f64>,
    pub container: Option<String>,
    pub dlna_profile: Option<String>,
    pub dlna_mime: Option<String>,
}

pub async fn upsert_image(pool: &SqlitePool, file_id: i64, meta: &ImageMeta) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO images (
            id, title, artist, date, width, height, orientation,
            gps_lat, gps_long, gps_alt, container, dlna_profile, dlna_mime
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            artist = excluded.artist,
            date = excluded.date,
            width = excluded.width,
            height = excluded.height,
            orientation = excluded.orientation,
            gps_lat = excluded.gps_lat,
            gps_long = excluded.gps_long,
            gps_alt = excluded.gps_alt,
            container = excluded.container,
            dlna_profile = excluded.dlna_profile,
            dlna_mime = excluded.dlna_mime
        "#,
    )
    .bind(file_id)
    .bind(&meta.title)
    .bind(&meta.artist)
    .bind(meta.date)
    .bind(meta.width)
    .bind(meta.height)
    .bind(meta.orientation)
    .bind(meta.gps_lat)
    .bind(meta.gps_long)
    .bind(meta.gps_alt)
    .bind(&meta.container)
    .bind(&meta.dlna_profile)
    .bind(&meta.dlna_mime)
    .execute(pool)
    .await
    .map_err(|e| ScanError::Common(e.into()))?;
    Ok(())
}

/// Metadata extracted for a playlist file.
#[derive(Debug, Clone, Default)]
pub struct PlaylistMeta {
    pub title: Option<String>,
    pub n_entries: i64,
}

pub async fn upsert_playlist(pool: &SqlitePool, file_id: i64, meta: &PlaylistMeta) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO playlists (id, title, n_entries) VALUES (?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET title = excluded.title, n_entries = excluded.n_entries
        "#,
    )
    .bind(file_id)
    .bind(&meta.title)
    .bind(meta.n_entries)
    .execute(pool)
    .await
    .map_err(|e| ScanError::Common(e.into()))?;
    Ok(())
}

/// Metadata extracted for a video file (container-level only; per-stream
/// detail insertion is left to the `generic` plugin when it probes streams).
#[derive(Debug, Clone, Default)]
pub struct VideoMeta {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub length: Option<i64>,
    pub container: Option<String>,
    pub dlna_profile: Option<String>,
    pub dlna_mime: Option<String>,
}

pub async fn upsert_video(pool: &SqlitePool, file_id: i64, meta: &VideoMeta) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO videos (id, title, artist, length, container, dlna_profile, dlna_mime, packet_size)
        VALUES (?, ?, ?, ?, ?, ?, ?, 0)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            artist = excluded.artist,
            length = excluded.length,
            container = excluded.container,
            dlna_profile = excluded.dlna_profile,
            dlna_mime = excluded.dlna_mime
        "#,
    )
    .bind(file_id)
    .bind(&meta.title)
    .bind(&meta.artist)
    .bind(meta.length)
    .bind(&meta.container)
    .bind(&meta.dlna_profile)
    .bind(&meta.dlna_mime)
    .execute(pool)
    .await
    .map_err(|e| ScanError::Common(e.into()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::path::PathBuf;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn insert_then_lookup_round_trips() {
        let pool = memory_pool().await;
        let path = PathBuf::from("/music/a.mp3");
        let id = insert_file(&pool, &path, 1234, 111, 1).await.unwrap();

        let row = lookup_file(&pool, &path).await.unwrap().unwrap();
        assert_eq!(row.id, id);
        assert!(row.is_present());
        assert_eq!(row.size, 1234);
    }

    #[tokio::test]
    async fn delete_file_cascades_to_audio_row() {
        let pool = memory_pool().await;
        let path = PathBuf::from("/music/a.mp3");
        let id = insert_file(&pool, &path, 1, 1, 1).await.unwrap();
        upsert_audio(&pool, id, &AudioMeta { title: Some("T".into()), ..Default::default() })
            .await
            .unwrap();

        let audio_count: i64 = sqlx::query("SELECT COUNT(*) AS c FROM audios")
            .fetch_one(&pool)
            .await
            .unwrap()
            .get("c");
        assert_eq!(audio_count, 1);

        delete_file(&pool, id).await.unwrap();

        let audio_count: i64 = sqlx::query("SELECT COUNT(*) AS c FROM audios")
            .fetch_one(&pool)
            .await
            .unwrap()
            .get("c");
        assert_eq!(audio_count, 0);
    }

    #[tokio::test]
    async fn albums_dedupe_by_name_and_artist() {
        let pool = memory_pool().await;
        let id_a = get_or_create_artist(&pool, "Artist").await.unwrap();
        let album_1 = get_or_create_album(&pool, "Album", Some(id_a)).await.unwrap();
        let album_2 = get_or_create_album(&pool, "Album", Some(id_a)).await.unwrap();
        assert_eq!(album_1, album_2);
    }

    #[tokio::test]
    async fn mark_deleted_then_touch_revives() {
        let pool = memory_pool().await;
        let path = PathBuf::from("/music/a.mp3");
        let id = insert_file(&pool, &path, 10, 10, 1).await.unwrap();
        mark_deleted(&pool, id, 500).await.unwrap();

        let row = lookup_file(&pool, &path).await.unwrap().unwrap();
        assert!(!row.is_present());

        touch_file(&pool, id, 20, 20, 2).await.unwrap();
        let row = lookup_file(&pool, &path).await.unwrap().unwrap();
        assert!(row.is_present());
        assert_eq!(row.size, 20);
    }
}

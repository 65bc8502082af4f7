/// Rolling window between two accepted uploads from the same identity (24 hours)
pub const UPLOAD_COOLDOWN_SECS: i64 = 86_400;

/// Default request body limit for the upload route (10MB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10_485_760;

/// Default lifetime of the in-process catalog index cache
pub const DEFAULT_CATALOG_CACHE_SECS: u64 = 300;

/// Default session lifetime (30 days)
pub const DEFAULT_SESSION_TTL_SECS: i64 = 2_592_000;

/// Cache header applied to catalog listings
pub const CATALOG_CACHE_CONTROL: &str = "public, s-maxage=300, stale-while-revalidate=600";

/// Extensions a submitted file may carry
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["json", "png", "flarial"];

/// File name of the submission icon
pub const ICON_FILE_NAME: &str = "icon.png";

/// File name of the submission manifest
pub const MANIFEST_FILE_NAME: &str = "main.json";

/// Prefix of every pull request title opened by the upload pipeline
pub const PR_TITLE_PREFIX: &str = "Add config: ";

/// Default Git file mode for uploaded blobs
pub const BLOB_FILE_MODE: &str = "100644";

/// Scopes requested from GitHub at sign-in
pub const OAUTH_SCOPES: &str = "read:user user:email public_repo";

/// Session cookie name
pub const SESSION_COOKIE: &str = "marketplace_session";

/// OAuth CSRF state cookie name
pub const OAUTH_STATE_COOKIE: &str = "marketplace_oauth_state";

/// Lifetime of the OAuth state cookie (10 minutes)
pub const OAUTH_STATE_TTL_SECS: i64 = 600;

/// Fallback when no forwarded client address is present
pub const UNKNOWN_IP: &str = "unknown-ip";

/// Names containing any of these (after normalization) are rejected
pub const BLOCKED_WORDS: &[&str] = &[
    "nigger", "nigga", "fuck", "shit", "bitch", "asshole", "cunt", "faggot", "retard", "whore",
    "dick", "pussy", "bastard", "slut", "hell", "cock", "tits", "prick", "chink", "spic", "kike",
    "wop", "gook", "jap", "cracker", "freak", "douche", "skank", "tramp", "piss", "crap", "twat",
    "wanker", "arse", "bollocks", "bugger", "fart", "shag", "tosser", "dyke", "queer", "homo",
    "coon", "redskin", "wetback", "beaner", "gringo", "honky", "mick", "dago", "kraut", "yid",
    "paki", "raghead", "sandnigger", "towelhead", "cameljockey", "zipperhead", "slope", "nazi",
    "klan", "savage", "injun", "negro", "mulatto", "halfbreed", "mongoloid", "darkie", "sambo",
    "jewboy", "heeb", "shylock", "gyp", "gypsy", "tranny", "shemale", "pedophile", "rapist",
    "pervert", "skullfuck", "shithead", "fuckface", "dumbass", "jackass", "motherfucker",
    "cocksucker", "asswipe", "shitbag", "cum", "jizz", "spunk", "clit", "smegma", "buttfuck",
    "rimjob", "blowjob", "handjob", "fucktard", "dipshit", "pissflaps", "shitstain", "fuckwit",
    "arsehole", "bellend", "knob", "prat", "git", "minger", "slapper", "cholo", "uncle tom",
    "house nigger", "porch monkey", "jungle bunny", "tar baby", "pickaninny", "coonass",
    "nigglet", "fudgepacker", "carpetmuncher", "lezbo", "breeder", "pansy", "poof", "fairy",
    "butch", "sissy", "nancy", "whigger", "wigger", "whitey", "bluegum", "buckwheat", "jigaboo",
    "zip coon", "moon cricket", "spook", "boogie", "fuckoff", "piss off", "shitface", "asshat",
    "cocktease", "cumslut", "dickhead", "fucker", "twatface", "bint", "slag", "tart", "weasel",
    "scumbag", "bkl", "gaand", "madarchod", "bhokachoda", "chut", "lund", "lele", "bhosdike",
    "bhosad", "raand", "randi", "chuda", "chutiya", "ammi", "bari", "ashank", "mbg",
    "test",
];

// =============================================================================
// Error Messages
// =============================================================================

pub const ERR_UNAUTHORIZED: &str = "Unauthorized: Please sign in with GitHub";

pub const ERR_NAME_REQUIRED: &str = "Config name is required";

pub const ERR_PROHIBITED_NAME: &str = "Config name contains prohibited words";

pub const ERR_INVALID_NAME_CHARS: &str =
    "Config name contains characters that cannot be used in a branch name";

pub const ERR_DUPLICATE_SUBMISSION: &str = "A pull request with this config name already exists";

pub const ERR_UPLOAD_IN_PROGRESS: &str = "Upload already in progress";

pub const ERR_DISALLOWED_FILES: &str = "Folder can only contain .json, .png, and .flarial files.";

pub const ERR_MISSING_ICON: &str = "An icon.png file is required";

pub const ERR_MISSING_PAYLOAD: &str = "At least one config file is required";

pub const ERR_INVALID_SCRIPT_TYPE: &str = "Invalid script type - must be \"module\" or \"command\"";

pub const ERR_SCRIPT_NOT_FOUND: &str = "Script not found";
